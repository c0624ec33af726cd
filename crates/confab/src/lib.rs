//! # Confab
//!
//! A small client/server chat platform with invite-gated accounts and
//! per-session encryption.
//!
//! Confab ties four layers together:
//!
//! - [`confab_transport`] — length-prefixed framing over TCP
//! - [`confab_protocol`] — tagged frames, the login grammar, JSON payloads
//! - [`confab_crypto`] — session keys, AEAD, and the sealed key hand-off
//! - [`confab_store`] — the SQLite account store with one-shot invites
//!
//! The server authenticates each connection against the store, issues a
//! fresh session key sealed to the client, and hands every decrypted
//! message to your [`MessageHandler`]. The client drives the same
//! handshake from the other side and exposes a send/receive session.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use confab::{
//!     ChatMessage, ConfabClient, ConfabError, ConfabServer, ClientConfig,
//!     MessageHandler, Peer, SessionEvent,
//! };
//!
//! struct Echo;
//!
//! impl MessageHandler for Echo {
//!     async fn on_message(
//!         &self,
//!         peer: &Peer,
//!         message: ChatMessage,
//!     ) -> Result<(), ConfabError> {
//!         peer.send(&message).await
//!     }
//! }
//!
//! # async fn run() -> Result<(), ConfabError> {
//! let server = ConfabServer::<Echo>::builder()
//!     .bind("127.0.0.1:9191")
//!     .build(Echo)
//!     .await?;
//! server.store().register("alice", "correct horse", false)?;
//! tokio::spawn(server.run());
//!
//! let mut client = ConfabClient::new(ClientConfig {
//!     username: "alice".into(),
//!     password: "correct horse".into(),
//!     ..ClientConfig::default()
//! });
//! client.connect("127.0.0.1", 9191, 3).await?;
//! client.login(Arc::new(|event: SessionEvent| {
//!     println!("{event:?}");
//! })).await?;
//! client.send("hello").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod handler;
mod logging;
mod server;
mod session;

pub use client::ConfabClient;
pub use config::{ClientConfig, ServerConfig};
pub use error::{ConfabError, LoginError};
pub use handler::{MessageHandler, Peer};
pub use logging::{Redacted, init_tracing};
pub use server::{ConfabServer, ConfabServerBuilder};
pub use session::{EventCallback, Session, SessionEvent};

// Re-export the types that cross the crate's public API boundaries, so
// embedders depend on `confab` alone.
pub use confab_crypto::SessionKey;
pub use confab_protocol::{ChatMessage, Status, digest};
pub use confab_store::{
    AccountStore, AuthOutcome, RedeemOutcome, Registration, UserRecord,
};
pub use confab_transport::{ConnectionId, TcpConnection};
