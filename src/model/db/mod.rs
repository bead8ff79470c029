//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Private fields such as voter identities and password hashes are present.

use chrono::{DateTime, SubsecRound, Utc};

pub mod account;
pub mod device;
pub mod event;
pub mod question;

/// The current time, at the millisecond precision MongoDB stores.
pub fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
