#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod rooms;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;
use rooms::Rooms;

/// Build the server. The database connection is established by the
/// [`DatabaseFairing`] during ignition.
pub fn build() -> Rocket<Build> {
    base_rocket().attach(DatabaseFairing)
}

/// Everything except the database.
fn base_rocket() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(Rooms::default())
}

/// Build a server around an existing database connection, as used by tests.
#[cfg(test)]
pub(crate) async fn rocket_for_db(db_client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = db_client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    base_rocket().manage(db_client).manage(db)
}

/// Connect to the test database server named by `db_uri`.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(db_uri).await.unwrap()
}

/// A random database name, so that concurrent tests don't collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}
