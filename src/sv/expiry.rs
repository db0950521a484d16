//! Validity window of a license.
//!
//! Offsets are calendar based: a day-of-month that does not exist in the
//! target month rolls over into the next one, so Jan 31 + 1 month is Mar 3
//! (Mar 2 in a leap year) and Feb 29 + 1 year is Mar 1.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{Period, license_key},
  prelude::*,
};

/// Extra time a license stays valid past its nominal expiration
pub const GRACE_PERIOD: TimeDelta = TimeDelta::hours(2);

fn add_months(from: DateTime, months: i32) -> Option<DateTime> {
  let total = from.year() * 12 + from.month0() as i32 + months;
  let (year, month) = (total.div_euclid(12), total.rem_euclid(12) as u32 + 1);

  let date = NaiveDate::from_ymd_opt(year, month, 1)?
    .checked_add_days(chrono::Days::new(u64::from(from.day0())))?;
  Some(date.and_time(from.time()))
}

/// Nominal end of the window started at `from`, without grace.
/// `None` for periods that carry no end.
pub fn expires_at(period: Period, from: DateTime) -> Option<DateTime> {
  match period {
    Period::Lifetime | Period::Unspecified => None,
    Period::OneDay => from.checked_add_signed(TimeDelta::days(1)),
    Period::OneWeek => from.checked_add_signed(TimeDelta::days(7)),
    Period::OneMonth => add_months(from, 1),
    Period::ThreeMonths => add_months(from, 3),
    Period::SixMonths => add_months(from, 6),
    Period::OneYear => add_months(from, 12),
  }
}

pub fn is_expired(
  period: Period,
  effective_from: Option<DateTime>,
  now: DateTime,
) -> bool {
  // never activated, the clock has not started yet
  let Some(from) = effective_from else {
    return false;
  };

  match period {
    Period::Lifetime => false,
    // rows without a duration class fail closed
    Period::Unspecified => true,
    period => match expires_at(period, from)
      .and_then(|at| at.checked_add_signed(GRACE_PERIOD))
    {
      Some(deadline) => now > deadline,
      None => true,
    },
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseState {
  Unactivated,
  Active,
  Expired,
  Revoked,
}

impl LicenseState {
  pub fn of(license: &license_key::Model, now: DateTime) -> Self {
    if license.revoked {
      Self::Revoked
    } else if license.effective_from.is_none() {
      Self::Unactivated
    } else if is_expired(license.duration, license.effective_from, now) {
      Self::Expired
    } else {
      Self::Active
    }
  }
}

#[cfg(test)]
mod tests {
  use sea_orm::Iterable;

  use super::*;

  fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
  }

  fn bounded() -> impl Iterator<Item = Period> {
    Period::iter()
      .filter(|p| !matches!(p, Period::Lifetime | Period::Unspecified))
  }

  #[test]
  fn test_never_activated_is_not_expired() {
    let now = at(2030, 1, 1, 0);
    for period in Period::iter().filter(|p| *p != Period::Lifetime) {
      assert!(!is_expired(period, None, now), "{period}");
    }
  }

  #[test]
  fn test_lifetime_never_expires() {
    for from in [at(1970, 1, 1, 0), at(2024, 2, 29, 12), at(2999, 12, 31, 23)]
    {
      assert!(!is_expired(Period::Lifetime, Some(from), at(3000, 1, 1, 0)));
    }
  }

  #[test]
  fn test_grace_period() {
    let from = at(2025, 1, 15, 10);
    for period in bounded() {
      let nominal = expires_at(period, from).unwrap();

      let inside = nominal + TimeDelta::hours(1);
      assert!(!is_expired(period, Some(from), inside), "{period}");

      let past = nominal + TimeDelta::hours(3);
      assert!(is_expired(period, Some(from), past), "{period}");
    }
  }

  #[test]
  fn test_unspecified_fails_closed() {
    let from = at(2025, 1, 1, 0);
    assert!(is_expired(Period::Unspecified, Some(from), from));
  }

  #[test]
  fn test_calendar_offsets() {
    let from = at(2025, 1, 15, 10);
    assert_eq!(expires_at(Period::OneDay, from), Some(at(2025, 1, 16, 10)));
    assert_eq!(expires_at(Period::OneWeek, from), Some(at(2025, 1, 22, 10)));
    assert_eq!(expires_at(Period::OneMonth, from), Some(at(2025, 2, 15, 10)));
    assert_eq!(
      expires_at(Period::ThreeMonths, from),
      Some(at(2025, 4, 15, 10))
    );
    assert_eq!(expires_at(Period::SixMonths, from), Some(at(2025, 7, 15, 10)));
    assert_eq!(expires_at(Period::OneYear, from), Some(at(2026, 1, 15, 10)));
  }

  #[test]
  fn test_month_end_rolls_over() {
    assert_eq!(
      expires_at(Period::OneMonth, at(2025, 1, 31, 0)),
      Some(at(2025, 3, 3, 0))
    );
    assert_eq!(
      expires_at(Period::OneMonth, at(2024, 1, 31, 0)),
      Some(at(2024, 3, 2, 0))
    );
    assert_eq!(
      expires_at(Period::OneYear, at(2024, 2, 29, 0)),
      Some(at(2025, 3, 1, 0))
    );
    assert_eq!(
      expires_at(Period::SixMonths, at(2025, 8, 31, 0)),
      Some(at(2026, 3, 3, 0))
    );
  }

  #[test]
  fn test_state_of_license() {
    let now = at(2025, 6, 1, 0);
    let license = license_key::Model {
      id: 1,
      key: "k".into(),
      duration: Period::OneWeek,
      tier: Default::default(),
      effective_from: None,
      uses: 0,
      active_usage_id: String::new(),
      revoked: false,
      user_id: 1,
      sandbox_mode: false,
      created_at: now,
      updated_at: now,
    };
    assert_eq!(LicenseState::of(&license, now), LicenseState::Unactivated);

    let active =
      license_key::Model { effective_from: Some(now), ..license.clone() };
    assert_eq!(LicenseState::of(&active, now), LicenseState::Active);

    let later = now + TimeDelta::days(8);
    assert_eq!(LicenseState::of(&active, later), LicenseState::Expired);

    let revoked = license_key::Model { revoked: true, ..active };
    assert_eq!(LicenseState::of(&revoked, now), LicenseState::Revoked);
  }

  #[test]
  fn test_window_past_calendar_end_fails_closed() {
    let from = DateTime::MAX - TimeDelta::days(1);
    assert_eq!(expires_at(Period::OneDay, from), Some(DateTime::MAX));
    assert!(is_expired(Period::OneDay, Some(from), from));
  }

  #[test]
  fn test_state_wire_names() {
    let wire = json::to_string(&LicenseState::Unactivated).unwrap();
    assert_eq!(wire, "\"UNACTIVATED\"");
    let state: LicenseState = json::from_str("\"EXPIRED\"").unwrap();
    assert_eq!(state, LicenseState::Expired);
  }
}
