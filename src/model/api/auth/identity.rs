use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::error::Error;
use crate::model::common::VoterIdentity;

use super::AuthToken;

/// Private cookie holding the computer ID registered with `/singularity`.
pub const DEVICE_COOKIE: &str = "computer_id";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoterIdentity {
    type Error = Error;

    /// A signed-in account votes as itself, anyone else as their device.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.guard::<AuthToken>().await {
            Outcome::Success(token) => return Outcome::Success(VoterIdentity::account(token.id)),
            Outcome::Failure((status, e)) if status == Status::InternalServerError => {
                return Outcome::Failure((status, e))
            }
            _ => {}
        }

        match req.cookies().get_private(DEVICE_COOKIE) {
            Some(cookie) if !cookie.value().is_empty() => {
                Outcome::Success(VoterIdentity::device(cookie.value()))
            }
            _ => Outcome::Failure((
                Status::Unauthorized,
                Error::unauthorized("Register this device or sign in first"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::{
        figment::Figment,
        http::Cookie,
        local::asynchronous::Client,
        Build, Rocket,
    };

    use crate::Config;

    #[get("/whoami")]
    fn whoami(voter: VoterIdentity) -> String {
        voter.to_string()
    }

    fn rocket() -> Rocket<Build> {
        rocket::build().mount("/", routes![whoami])
    }

    fn config() -> Config {
        Figment::new()
            .merge(("auth_ttl", 60))
            .merge(("jwt_secret", "not very secret"))
            .extract()
            .unwrap()
    }

    #[rocket::async_test]
    async fn devices_vote_as_themselves() {
        let client = Client::tracked(rocket().manage(config())).await.unwrap();
        let response = client
            .get("/whoami")
            .private_cookie(Cookie::new(DEVICE_COOKIE, "f00dfeed"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "device:f00dfeed");
    }

    #[rocket::async_test]
    async fn strangers_are_unauthorized() {
        let client = Client::tracked(rocket().manage(config())).await.unwrap();
        let response = client.get("/whoami").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .get("/whoami")
            .private_cookie(Cookie::new(DEVICE_COOKIE, ""))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn server_errors_beat_the_device_cookie() {
        // Without managed config the session can't be checked at all, and
        // that must not be mistaken for "not signed in".
        let client = Client::tracked(rocket()).await.unwrap();
        let response = client
            .get("/whoami")
            .private_cookie(Cookie::new(DEVICE_COOKIE, "f00dfeed"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::InternalServerError);
    }
}
