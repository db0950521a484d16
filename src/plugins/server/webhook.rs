use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::HeaderMap};

use crate::{
  paypal::{Event, PayPal, order_of_capture},
  prelude::*,
  state::AppState,
  sv::Outcome,
};

const ORDER_APPROVED: &str = "CHECKOUT.ORDER.APPROVED";
const CAPTURE_COMPLETED: &str = "PAYMENT.CAPTURE.COMPLETED";
// funds held by PayPal still count as paid
const CAPTURE_PENDING: &str = "PAYMENT.CAPTURE.PENDING";
const CAPTURE_DENIED: &str = "PAYMENT.CAPTURE.DENIED";
const CAPTURE_REFUNDED: &str = "PAYMENT.CAPTURE.REFUNDED";

/// Acknowledges every event with a valid signature, even when handling it
/// failed. PayPal would otherwise keep redelivering it.
pub async fn paypal(
  State(app): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<&'static str> {
  let paypal = app
    .paypal
    .as_ref()
    .ok_or_else(|| Error::Provider("PayPal is not configured".into()))?;

  let raw: json::Value = json::from_slice(&body)
    .map_err(|_| Error::InvalidOperation("malformed webhook body"))?;

  match paypal.verify_webhook(&headers, &raw).await {
    Ok(true) => {}
    Ok(false) => {
      warn!("PayPal webhook with an invalid signature");
      return Err(Error::Unauthorized("invalid signature"));
    }
    Err(err) => {
      error!("PayPal webhook verification failed: {err}");
      return Err(Error::Unauthorized("invalid signature"));
    }
  }

  let event: Event = json::from_value(raw)
    .map_err(|_| Error::InvalidOperation("malformed webhook event"))?;

  info!("PayPal event `{}` ({})", event.event_type, event.id);
  if let Err(err) = dispatch(&app, paypal, &event).await {
    error!("Failed to handle PayPal event `{}`: {err}", event.event_type);
  }

  Ok("OK")
}

async fn dispatch(
  app: &AppState,
  paypal: &PayPal,
  event: &Event,
) -> Result<()> {
  match event.event_type.as_str() {
    ORDER_APPROVED => {
      let order_id = resource_id(event)?;
      let status = paypal.capture_order(order_id).await?;
      info!("Captured PayPal order {order_id}: {status}");
    }
    CAPTURE_COMPLETED | CAPTURE_PENDING => {
      record_capture(app, paypal, event).await?
    }
    CAPTURE_DENIED | CAPTURE_REFUNDED => {
      info!("PayPal capture event `{}` ({})", event.event_type, event.id);
    }
    other => debug!("Ignoring PayPal event `{other}`"),
  }
  Ok(())
}

fn resource_id(event: &Event) -> Result<&str> {
  event
    .resource
    .get("id")
    .and_then(|id| id.as_str())
    .filter(|id| !id.is_empty())
    .ok_or_else(|| {
      Error::Provider(format!("event {} has no resource id", event.id))
    })
}

async fn record_capture(
  app: &AppState,
  paypal: &PayPal,
  event: &Event,
) -> Result<()> {
  let capture_id = resource_id(event)?;
  let order_id = order_of_capture(&event.resource).ok_or_else(|| {
    Error::Provider(format!("capture {capture_id} has no order link"))
  })?;

  let sv = app.sv();
  if sv.payment.by_reference(capture_id).await?.is_some() {
    info!("PayPal capture {capture_id} already processed");
    return Ok(());
  }

  let capture = paypal.order(&order_id).await?.capture(capture_id)?;
  if sv.user.by_id(capture.user_id).await?.is_none() {
    return Err(Error::UserNotFound);
  }

  match sv.payment.intake(capture).await? {
    Outcome::Issued(license) => {
      info!("PayPal capture {capture_id} issued license {}", license.id)
    }
    Outcome::Renewed(license) => {
      info!("PayPal capture {capture_id} renewed license {}", license.id)
    }
    Outcome::AlreadyProcessed => {
      info!("PayPal capture {capture_id} already processed")
    }
  }
  Ok(())
}
