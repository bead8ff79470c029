//! Client-side synchronisation store.
//!
//! A [`SyncStore`] holds a local, never-authoritative copy of one event plus
//! the signed-in session. Commands go to the server through a [`QnaApi`];
//! their effects come back through the event's push channel, after which the
//! store re-fetches the full event snapshot.

mod api;
mod command;
mod config;
mod error;
mod push;
mod sse;
mod store;

#[cfg(test)]
mod fake;

pub use api::{HttpApi, Notice, NoticeStream, QnaApi};
pub use command::{Command, Reply};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use push::{BackoffPolicy, ConnectionState, PushHandle};
pub use sse::{SseDecoder, SseMessage};
pub use store::{commit, ClientCache, Mutation, SyncStore};
