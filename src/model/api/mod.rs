//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Field names are camelCase.
//! - Voter identities and password hashes never appear.
//!
//! The synchronisation client deserialises the very same types.

pub mod account;
pub mod auth;
pub mod event;
pub mod id;
pub mod question;
