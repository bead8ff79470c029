//! Types shared between the database and API representations.

mod voter;

pub use voter::{VotePolicy, VoterIdentity};
