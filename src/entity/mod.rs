pub mod activity;
pub mod license_key;
pub mod offset;
pub mod payment;
pub mod user;

pub use license_key::{Period, Tier};
