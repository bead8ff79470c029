use mongodb::{bson::doc, options::FindOptions};
use rocket::{
    futures::TryStreamExt,
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        account::{Credentials, RegisterRequest, SessionDescription},
        auth::{AuthToken, AUTH_TOKEN_COOKIE},
        event::EventSummary,
    },
    db::{
        account::{Account, NewAccount},
        event::Event,
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};
use crate::Config;

pub fn routes() -> Vec<Route> {
    routes![register, login, logout, session]
}

/// Create an account and sign in as it.
#[post("/account/register", data = "<request>", format = "json")]
pub async fn register(
    request: Json<RegisterRequest>,
    cookies: &CookieJar<'_>,
    accounts: Coll<Account>,
    new_accounts: Coll<NewAccount>,
    events: Coll<Event>,
    config: &State<Config>,
) -> Result<Json<SessionDescription>> {
    let account = NewAccount::try_from(request.into_inner().user)?;

    let id: Id = match new_accounts.insert_one(&account, None).await {
        Ok(result) => result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| {
                Error::Status(
                    Status::InternalServerError,
                    "Inserted account has no ObjectId".to_string(),
                )
            })?
            .into(),
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(Error::Status(
                Status::Conflict,
                format!("Username '{}' is taken", account.username),
            ))
        }
        Err(e) => return Err(e.into()),
    };
    info!("Registered account {id} ({})", account.username);

    let account = accounts
        .find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Account with ID '{id}'")))?;
    cookies.add(AuthToken::new(&account).into_cookie(config)?);
    Ok(Json(describe(&account, &events).await?))
}

#[post("/account/session", data = "<credentials>", format = "json")]
pub async fn login(
    credentials: Json<Credentials>,
    cookies: &CookieJar<'_>,
    accounts: Coll<Account>,
    events: Coll<Event>,
    config: &State<Config>,
) -> Result<Json<SessionDescription>> {
    let with_username = doc! {
        "username": credentials.username.trim(),
    };

    let account = accounts
        .find_one(with_username, None)
        .await?
        .filter(|account| account.verify_password(&credentials.password))
        .ok_or_else(|| Error::unauthorized("Unknown username and password combination"))?;

    cookies.add(AuthToken::new(&account).into_cookie(config)?);
    Ok(Json(describe(&account, &events).await?))
}

#[delete("/account/session")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

/// The signed-in account, or `null`.
#[get("/account/session")]
pub async fn session(
    token: Option<AuthToken>,
    accounts: Coll<Account>,
    events: Coll<Event>,
) -> Result<Json<Option<SessionDescription>>> {
    let Some(token) = token else {
        return Ok(Json(None));
    };
    let account = accounts
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Account with ID '{}'", token.id)))?;
    Ok(Json(Some(describe(&account, &events).await?)))
}

/// Describe an account along with the events it moderates, oldest first.
async fn describe(account: &Account, events: &Coll<Event>) -> Result<SessionDescription> {
    let oldest_first = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
    let owned = events
        .find(doc! { "owner": account.id }, oldest_first)
        .await?
        .map_ok(EventSummary::from)
        .try_collect::<Vec<_>>()
        .await?;
    Ok(SessionDescription::new(account, owned))
}
