//! Session crypto for Confab.
//!
//! Three jobs, all scoped to one connection's lifetime:
//!
//! 1. **Session keys** ([`SessionKey`]) — 256-bit symmetric keys, generated
//!    fresh per successful handshake and never persisted.
//! 2. **Application frame crypto** ([`encrypt`] / [`decrypt`]) —
//!    ChaCha20-Poly1305 over each post-handshake payload. Tampering or a
//!    wrong key fails loudly; there is no silent data loss.
//! 3. **Key hand-off** ([`seal_session_key`] / [`HandshakeKeyPair`]) — the
//!    session key crosses the wire exactly once, sealed to an ephemeral
//!    X25519 public key the client supplied with its credentials. The key
//!    is never transmitted bare.

mod error;
mod seal;
mod session_key;

pub use error::CryptoError;
pub use seal::{HandshakeKeyPair, seal_session_key};
pub use session_key::{
    KEY_SIZE, NONCE_SIZE, SessionKey, TAG_SIZE, decrypt, encrypt,
};
