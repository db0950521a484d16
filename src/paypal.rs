//! Minimal PayPal REST client: OAuth, webhook verification and orders.

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use serde::Deserialize;

use crate::{
  entity::{Period, Tier, payment::Provider},
  prelude::*,
  sv::{Capture, Purpose},
};

const SANDBOX_API: &str = "https://api-m.sandbox.paypal.com";
const LIVE_API: &str = "https://api-m.paypal.com";
const CURRENCY: &str = "EUR";
const PRODUCT: &str = "EB2";

#[derive(Debug, Clone)]
pub struct PayPalConfig {
  pub client_id: String,
  pub client_secret: String,
  pub webhook_id: String,
  pub sandbox: bool,
  pub return_url: String,
  pub cancel_url: String,
}

/// Checkout price of a new license or a renewal
pub fn price_in_cents(period: Period) -> Option<i64> {
  match period {
    Period::OneWeek => Some(950),
    Period::OneMonth => Some(1900),
    Period::SixMonths => Some(7900),
    Period::OneYear => Some(12900),
    Period::Lifetime => Some(19900),
    _ => None,
  }
}

pub fn display_name(period: Period, renewal: bool) -> String {
  let period = match period {
    Period::Lifetime => "Lifetime",
    Period::OneWeek => "1-Week",
    Period::OneMonth => "1-Month",
    Period::SixMonths => "6-Month",
    Period::OneYear => "1-Year",
    _ => "Unknown Duration",
  };

  if renewal {
    format!("{PRODUCT} - {period} License Renewal")
  } else {
    format!("{PRODUCT} - {period} License")
  }
}

fn format_amount(cents: i64) -> String {
  format!("{}.{:02}", cents / 100, cents % 100)
}

/// "19.00" -> 1900, without going through floats
fn parse_cents(value: &str) -> Option<i64> {
  let value = value.trim();
  let (units, fraction) = value.split_once('.').unwrap_or((value, ""));
  let units: i64 = units.parse().ok()?;
  let fraction = match fraction.len() {
    0 => 0,
    1 => fraction.parse::<i64>().ok()? * 10,
    2 => fraction.parse().ok()?,
    _ => return None,
  };
  Some(units * 100 + fraction)
}

/// What a checkout was for, carried through PayPal in `custom_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderMeta {
  pub user_id: i64,
  pub duration: Period,
  pub sandbox_mode: bool,
  pub renewal_of: Option<i64>,
}

impl OrderMeta {
  pub fn encode(&self) -> Result<String> {
    let mut map = BTreeMap::new();
    map.insert("user_id", self.user_id.to_string());
    map.insert("is_renewal", self.renewal_of.is_some().to_string());
    map.insert("duration", self.duration.to_string());
    map.insert("sandbox_mode", self.sandbox_mode.to_string());
    if let Some(id) = self.renewal_of {
      map.insert("license_id", id.to_string());
    }
    Ok(json::to_string(&map)?)
  }

  pub fn decode(custom_id: &str) -> Result<Self> {
    let map: BTreeMap<String, String> = json::from_str(custom_id)?;
    let field = |name: &str| {
      map
        .get(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Provider(format!("order metadata lacks `{name}`")))
    };
    let number = |name: &str| -> Result<i64> {
      field(name)?
        .parse()
        .map_err(|_| Error::Provider(format!("order metadata `{name}` is bad")))
    };

    let user_id = number("user_id")?;
    let sandbox_mode = map.get("sandbox_mode").is_some_and(|v| v == "true");
    let renewal = map.get("is_renewal").is_some_and(|v| v == "true");

    let duration = match map.get("duration") {
      Some(value) if !value.is_empty() => {
        value.parse().map_err(Error::Provider)?
      }
      _ => Period::Unspecified,
    };

    let renewal_of = if renewal { Some(number("license_id")?) } else { None };
    if renewal_of.is_none() && duration == Period::Unspecified {
      return Err(Error::Provider("order metadata lacks a duration".into()));
    }

    Ok(Self { user_id, duration, sandbox_mode, renewal_of })
  }

  pub fn purpose(&self) -> Purpose {
    match self.renewal_of {
      Some(license_id) => Purpose::Renewal { license_id },
      None => {
        Purpose::NewLicense { duration: self.duration, tier: Tier::Premium }
      }
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
  pub href: String,
  pub rel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Money {
  pub currency_code: String,
  pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseUnit {
  #[serde(default)]
  pub custom_id: String,
  pub amount: Option<Money>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayerName {
  #[serde(default)]
  pub given_name: String,
  #[serde(default)]
  pub surname: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payer {
  pub email_address: Option<String>,
  pub name: Option<PayerName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
  pub id: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub purchase_units: Vec<PurchaseUnit>,
  pub payer: Option<Payer>,
  #[serde(default)]
  pub links: Vec<Link>,
}

impl Order {
  /// Payment intake input for the capture `capture_id` of this order
  pub fn capture(&self, capture_id: &str) -> Result<Capture> {
    let unit = self.purchase_units.first().ok_or_else(|| {
      Error::Provider(format!("order {} has no purchase units", self.id))
    })?;
    let meta = OrderMeta::decode(&unit.custom_id)?;

    let (amount_in_cents, currency) = match &unit.amount {
      Some(money) => (
        parse_cents(&money.value).unwrap_or_default(),
        money.currency_code.to_lowercase(),
      ),
      None => (0, String::new()),
    };

    let payer = self.payer.as_ref();
    let billing_email = payer
      .and_then(|payer| payer.email_address.clone())
      .filter(|email| !email.is_empty());
    let billing_name = payer
      .and_then(|payer| payer.name.as_ref())
      .map(|name| format!("{} {}", name.given_name, name.surname))
      .map(|name| name.trim().to_string())
      .filter(|name| !name.is_empty());

    Ok(Capture {
      provider: Provider::Paypal,
      reference_id: capture_id.to_string(),
      amount_in_cents,
      currency,
      sandbox_mode: meta.sandbox_mode,
      user_id: meta.user_id,
      billing_email,
      billing_name,
      purpose: meta.purpose(),
    })
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
  #[serde(default)]
  pub id: String,
  pub event_type: String,
  #[serde(default)]
  pub resource: json::Value,
}

/// Id of the order a capture belongs to, from its `up` link
pub fn order_of_capture(resource: &json::Value) -> Option<String> {
  let links: Vec<Link> =
    json::from_value(resource.get("links")?.clone()).ok()?;
  links
    .iter()
    .find(|link| link.rel == "up")
    .and_then(|link| link.href.rsplit('/').next())
    .filter(|id| !id.is_empty())
    .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct Checkout {
  pub order_id: String,
  pub checkout_url: String,
}

#[derive(Deserialize)]
struct Token {
  access_token: String,
}

#[derive(Deserialize)]
struct Verification {
  verification_status: String,
}

pub struct PayPal {
  http: reqwest::Client,
  config: PayPalConfig,
}

impl PayPal {
  pub fn new(config: PayPalConfig) -> Self {
    Self { http: reqwest::Client::new(), config }
  }

  pub fn sandbox(&self) -> bool {
    self.config.sandbox
  }

  fn url(&self, path: &str) -> String {
    let base = if self.config.sandbox { SANDBOX_API } else { LIVE_API };
    format!("{base}{path}")
  }

  async fn token(&self) -> Result<String> {
    let token: Token = self
      .http
      .post(self.url("/v1/oauth2/token"))
      .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
      .form(&[("grant_type", "client_credentials")])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;
    Ok(token.access_token)
  }

  /// Asks PayPal whether the transmission headers sign `event`
  pub async fn verify_webhook(
    &self,
    headers: &HeaderMap,
    event: &json::Value,
  ) -> Result<bool> {
    let header = |name: &str| {
      headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
    };

    let body = json::json!({
      "auth_algo": header("paypal-auth-algo"),
      "cert_url": header("paypal-cert-url"),
      "transmission_id": header("paypal-transmission-id"),
      "transmission_sig": header("paypal-transmission-sig"),
      "transmission_time": header("paypal-transmission-time"),
      "webhook_id": self.config.webhook_id,
      "webhook_event": event,
    });

    let verification: Verification = self
      .http
      .post(self.url("/v1/notifications/verify-webhook-signature"))
      .bearer_auth(self.token().await?)
      .json(&body)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(verification.verification_status == "SUCCESS")
  }

  pub async fn order(&self, order_id: &str) -> Result<Order> {
    let order = self
      .http
      .get(self.url(&format!("/v2/checkout/orders/{order_id}")))
      .bearer_auth(self.token().await?)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;
    Ok(order)
  }

  /// Captures an approved order, returns the order status
  pub async fn capture_order(&self, order_id: &str) -> Result<String> {
    let order: Order = self
      .http
      .post(self.url(&format!("/v2/checkout/orders/{order_id}/capture")))
      .bearer_auth(self.token().await?)
      .json(&json::json!({}))
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;
    Ok(order.status)
  }

  pub async fn create_order(&self, meta: &OrderMeta) -> Result<Checkout> {
    let cents = price_in_cents(meta.duration).ok_or(Error::InvalidOperation(
      "no price for this license duration",
    ))?;
    let amount = format_amount(cents);

    let body = json::json!({
      "intent": "CAPTURE",
      "purchase_units": [{
        "reference_id": format!("ref_{}", meta.user_id),
        "custom_id": meta.encode()?,
        "amount": {
          "currency_code": CURRENCY,
          "value": amount,
          "breakdown": {
            "item_total": { "currency_code": CURRENCY, "value": amount },
          },
        },
        "items": [{
          "name": display_name(meta.duration, meta.renewal_of.is_some()),
          "unit_amount": { "currency_code": CURRENCY, "value": amount },
          "quantity": "1",
          "category": "DIGITAL_GOODS",
        }],
      }],
      "application_context": {
        "return_url": self.config.return_url,
        "cancel_url": self.config.cancel_url,
        "user_action": "PAY_NOW",
        "shipping_preference": "NO_SHIPPING",
        "landing_page": "BILLING",
      },
    });

    let order: Order = self
      .http
      .post(self.url("/v2/checkout/orders"))
      .bearer_auth(self.token().await?)
      .json(&body)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    let checkout_url = order
      .links
      .iter()
      .find(|link| link.rel == "approve")
      .map(|link| link.href.clone())
      .ok_or_else(|| {
        Error::Provider(format!("order {} has no approval link", order.id))
      })?;

    debug!("Created PayPal order {} for user {}", order.id, meta.user_id);
    Ok(Checkout { order_id: order.id, checkout_url })
  }
}
