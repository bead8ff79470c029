use chrono::{DateTime, Utc};
use mongodb::bson::{
    doc, serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime, Document,
};
use serde::{Deserialize, Serialize};

/// A client device that registered its computer ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub computer_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub first_seen: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// Filter matching this computer ID.
    pub fn filter(computer_id: &str) -> Document {
        doc! { "computer_id": computer_id }
    }

    /// Upsert recording that the device was seen at `now`.
    pub fn seen_update(now: DateTime<Utc>) -> Document {
        let now = BsonDateTime::from_chrono(now);
        doc! {
            "$setOnInsert": { "first_seen": now },
            "$set": { "last_seen": now },
        }
    }
}
