use mongodb::options::UpdateOptions;
use rocket::{
    http::{Cookie, CookieJar, SameSite},
    serde::json::Json,
    Route,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{account::DeviceRegistration, auth::DEVICE_COOKIE},
    db::{device::Device, timestamp},
    mongodb::Coll,
};

pub const MAX_COMPUTER_ID_LENGTH: usize = 128;

pub fn routes() -> Vec<Route> {
    routes![register_device]
}

/// Register this device's computer ID, which it votes and asks under until
/// someone signs in.
#[post("/singularity", data = "<registration>", format = "json")]
pub async fn register_device(
    registration: Json<DeviceRegistration>,
    cookies: &CookieJar<'_>,
    devices: Coll<Device>,
) -> Result<()> {
    let computer_id = registration.computer_id.trim();
    if computer_id.is_empty()
        || computer_id.len() > MAX_COMPUTER_ID_LENGTH
        || !computer_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::bad_request(format!(
            "Computer IDs are 1 to {MAX_COMPUTER_ID_LENGTH} letters, digits, '-' or '_'"
        )));
    }

    let upsert = UpdateOptions::builder().upsert(true).build();
    devices
        .update_one(
            Device::filter(computer_id),
            Device::seen_update(timestamp()),
            upsert,
        )
        .await?;
    debug!("Registered device {computer_id}");

    cookies.add_private(
        Cookie::build(DEVICE_COOKIE, computer_id.to_string())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use super::*;

    async fn register(client: &Client, computer_id: &str) -> Status {
        client
            .post(uri!(register_device))
            .header(ContentType::JSON)
            .body(json!({ "computerId": computer_id }).to_string())
            .dispatch()
            .await
            .status()
    }

    #[backend_test]
    async fn registers_and_sets_cookie(client: Client, devices: Coll<Device>) {
        assert_eq!(Status::Ok, register(&client, "3f2a9c").await);
        assert_eq!(
            client.cookies().get_private(DEVICE_COOKIE).unwrap().value(),
            "3f2a9c"
        );

        let device = devices
            .find_one(Device::filter("3f2a9c"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(device.first_seen, device.last_seen);
    }

    #[backend_test]
    async fn reregistering_keeps_first_seen(client: Client, devices: Coll<Device>) {
        register(&client, "3f2a9c").await;
        let first = devices
            .find_one(Device::filter("3f2a9c"), None)
            .await
            .unwrap()
            .unwrap();

        rocket::tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        register(&client, "3f2a9c").await;
        let second = devices
            .find_one(Device::filter("3f2a9c"), None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(devices.count_documents(None, None).await.unwrap(), 1);
        assert_eq!(first.first_seen, second.first_seen);
        assert!(second.last_seen > first.last_seen);
    }

    #[backend_test]
    async fn rejects_bad_ids(client: Client, devices: Coll<Device>) {
        for bad in ["", "   ", "has space", "semi;colon"] {
            assert_eq!(Status::BadRequest, register(&client, bad).await);
        }
        let too_long = "a".repeat(MAX_COMPUTER_ID_LENGTH + 1);
        assert_eq!(Status::BadRequest, register(&client, &too_long).await);

        assert_eq!(devices.count_documents(None, None).await.unwrap(), 0);
        assert!(client.cookies().get_private(DEVICE_COOKIE).is_none());
    }
}
