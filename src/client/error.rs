use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong talking to the server.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("server responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("undecodable response: {0}")]
    Decode(String),
    #[error("push channel failed: {0}")]
    Push(String),
    #[error("no event selected")]
    NoEvent,
    #[error(transparent)]
    Config(#[from] rocket::figment::Error),
    #[error("could not keep this device's computer ID: {0}")]
    Identity(#[from] std::io::Error),
}

impl Error {
    /// The HTTP status the server responded with, if it got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}
