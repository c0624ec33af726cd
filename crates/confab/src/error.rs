//! Unified error type for the Confab meta-crate.

use confab_crypto::CryptoError;
use confab_protocol::{ProtocolError, Status};
use confab_store::StoreError;
use confab_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `confab` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attributes auto-generate `From` impls, so `?` converts sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ConfabError {
    /// A transport-level error (connect, send, recv, framing).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (parse, encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A crypto error (decrypt failure, malformed sealed key).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// An account store error (duplicate user, database failure).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The handshake was rejected, by either side's rules.
    #[error("login failed: {0}")]
    Login(#[from] LoginError),

    /// The client already has a live connection or session.
    #[error("already connected")]
    AlreadyConnected,

    /// The operation needs a connection (or a completed login) that
    /// doesn't exist.
    #[error("not connected")]
    NotConnected,

    /// Reading or writing a config file failed.
    #[error("config I/O failed: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// A config file did not parse as TOML.
    #[error("config parse failed: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A config struct could not be serialized to TOML.
    #[error("config serialize failed: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

/// Why a login handshake ended without a session.
///
/// The server sends these as plaintext status strings; the client maps
/// them back into this type. Each one is fatal to the connection attempt
/// and non-fatal to everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    /// No account under that username.
    #[error("unknown user")]
    UnknownUser,

    /// The password digest did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but its invite has not been redeemed.
    #[error("account pending verification")]
    Unverified,

    /// The presented invite digest did not match (or the invite was
    /// already consumed).
    #[error("invite digest mismatch")]
    InviteMismatch,

    /// The server's session cap is reached.
    #[error("server is full")]
    ServerFull,

    /// The peer hung up mid-handshake.
    #[error("connection closed during login")]
    ConnectionClosed,

    /// The handshake timed out waiting for the peer.
    #[error("login timed out")]
    TimedOut,
}

impl LoginError {
    /// Maps a server status string to the rejection it represents.
    /// `Status::Verified` is not a rejection and maps to `None`.
    pub fn from_status(status: Status) -> Option<Self> {
        match status {
            Status::UnknownUser => Some(Self::UnknownUser),
            Status::BadCredentials => Some(Self::InvalidCredentials),
            Status::Unverified => Some(Self::Unverified),
            Status::InviteMismatch => Some(Self::InviteMismatch),
            Status::ServerFull => Some(Self::ServerFull),
            Status::Verified => None,
        }
    }
}
