pub mod activity;
pub mod expiry;
pub mod keygen;
pub mod license;
pub mod offsets;
pub mod payment;
pub mod search;
pub mod session;
pub mod user;

pub use expiry::LicenseState;
pub use license::License;
pub use offsets::Offsets;
pub use payment::{Capture, Outcome, Payment, Purpose};
pub use search::Search;
pub use session::{ActiveUsers, Sessions};
pub use user::{Actor, Identity, User};
