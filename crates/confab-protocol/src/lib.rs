//! Wire protocol for Confab.
//!
//! This crate defines the "language" that clients and servers speak:
//!
//! - **Types** ([`Frame`], [`FrameKind`], [`LoginRequest`], [`Status`],
//!   [`ChatMessage`]) — the structures that travel inside length-prefixed
//!   transport frames.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how application payloads
//!   are converted to/from bytes.
//! - **Credentials** ([`digest`]) — the one-way digest used for passwords
//!   and invite words, both at rest and on the wire.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while parsing.
//!
//! The protocol layer sits between transport (raw frames) and session
//! (identity and keys). It doesn't know about sockets or the account
//! store — it only knows how to read and write messages.
//!
//! Every frame payload starts with a one-byte [`FrameKind`] tag. The tag
//! replaces any guessing about whether bytes are ciphertext: a receiver
//! never has to sniff content to know how to interpret a frame.

mod codec;
mod credentials;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use credentials::{DIGEST_LEN, digest, is_digest};
pub use error::ProtocolError;
pub use types::{
    ChatMessage, Frame, FrameKind, LoginRequest, Status, parse_invite_digest,
};
