use rocket::Route;

mod account;
mod common;
mod device;
mod events;
mod questions;
mod updates;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(account::routes());
    routes.extend(device::routes());
    routes.extend(events::routes());
    routes.extend(questions::routes());
    routes.extend(updates::routes());
    routes
}
