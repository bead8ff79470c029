use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    account::{Account, NewAccount},
    device::Device,
    event::{Event, NewEvent},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Event collections. Questions are embedded in their event.
const EVENTS: &str = "events";
impl MongoCollection for Event {
    const NAME: &'static str = EVENTS;
}
impl MongoCollection for NewEvent {
    const NAME: &'static str = EVENTS;
}

// Account collections
const ACCOUNTS: &str = "accounts";
impl MongoCollection for Account {
    const NAME: &'static str = ACCOUNTS;
}
impl MongoCollection for NewAccount {
    const NAME: &'static str = ACCOUNTS;
}

// Device collection
const DEVICES: &str = "devices";
impl MongoCollection for Device {
    const NAME: &'static str = DEVICES;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Join codes identify events.
    let code_index = IndexModel::builder()
        .keys(doc! {"code": 1})
        .options(unique.clone())
        .build();
    Coll::<Event>::from_db(db)
        .create_index(code_index, None)
        .await?;

    // Session listings look events up by moderator.
    let owner_index = IndexModel::builder().keys(doc! {"owner": 1}).build();
    Coll::<Event>::from_db(db)
        .create_index(owner_index, None)
        .await?;

    let username_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<Account>::from_db(db)
        .create_index(username_index, None)
        .await?;

    let device_index = IndexModel::builder()
        .keys(doc! {"computer_id": 1})
        .options(unique)
        .build();
    Coll::<Device>::from_db(db)
        .create_index(device_index, None)
        .await?;

    Ok(())
}
