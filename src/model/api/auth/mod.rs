mod identity;
mod token;

pub use identity::DEVICE_COOKIE;
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
