//! Core protocol types for Confab's wire format.
//!
//! Everything here travels inside a transport frame (the 4-byte
//! length-prefixed unit). The first payload byte is always a [`FrameKind`]
//! tag; the rest is the body, whose meaning depends on the kind:
//!
//! ```text
//! Control   (0x00)  UTF-8 text: login request, invite digest, status
//! Key       (0x01)  the sealed session key blob, server → client, once
//! Encrypted (0x02)  AEAD ciphertext of a JSON ChatMessage
//! ```

use serde::{Deserialize, Serialize};

use crate::credentials::{DIGEST_LEN, is_digest};
use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// FrameKind and Frame
// ---------------------------------------------------------------------------

/// The one-byte tag at the start of every frame payload.
///
/// An explicit tag means the receiver never infers "encrypted" from
/// whether bytes happen to decode as UTF-8 — ciphertext that accidentally
/// looks like text cannot be misclassified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Plaintext control traffic (handshake, status strings).
    Control = 0x00,
    /// The sealed session key, sent exactly once per handshake.
    Key = 0x01,
    /// Ciphertext of an application payload under the session key.
    Encrypted = 0x02,
}

impl FrameKind {
    /// Maps a raw tag byte back to a kind.
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0x00 => Ok(Self::Control),
            0x01 => Ok(Self::Key),
            0x02 => Ok(Self::Encrypted),
            other => Err(ProtocolError::UnknownFrameKind(other)),
        }
    }
}

/// One tagged frame payload: kind byte plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub body: Vec<u8>,
}

impl Frame {
    /// Builds a plaintext control frame from text.
    pub fn control(text: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Control,
            body: text.into().into_bytes(),
        }
    }

    /// Builds the key hand-off frame around a sealed key blob.
    pub fn key(blob: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Key,
            body: blob,
        }
    }

    /// Builds an encrypted application frame around ciphertext.
    pub fn encrypted(ciphertext: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Encrypted,
            body: ciphertext,
        }
    }

    /// Serializes the frame into the payload of a transport frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.body.len());
        bytes.push(self.kind as u8);
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Parses a transport frame payload back into a tagged frame.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (&tag, body) =
            bytes.split_first().ok_or(ProtocolError::EmptyFrame)?;
        Ok(Self {
            kind: FrameKind::from_byte(tag)?,
            body: body.to_vec(),
        })
    }

    /// Returns the body as text. Only meaningful for control frames.
    pub fn control_text(&self) -> Result<&str, ProtocolError> {
        std::str::from_utf8(&self.body).map_err(|_| {
            ProtocolError::MalformedControl(
                "control body is not valid UTF-8".into(),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Control grammar
// ---------------------------------------------------------------------------

/// The client's opening handshake message.
///
/// Wire form is comma-joined text:
/// `username,password_digest,client_public_hex`. The password digest is
/// computed with [`digest`](crate::digest) — the plaintext password never
/// leaves the client. The third field is the hex of the client's ephemeral
/// X25519 public key, which the server seals the session key to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub username: String,
    pub password_digest: String,
    /// The client's ephemeral public key for this handshake.
    pub client_public: [u8; 32],
}

impl LoginRequest {
    /// Renders the request as control-frame text.
    pub fn to_wire(&self) -> String {
        format!(
            "{},{},{}",
            self.username,
            self.password_digest,
            hex::encode(self.client_public)
        )
    }

    /// Parses control-frame text into a login request.
    ///
    /// Rejects empty usernames (a comma-joined grammar cannot carry
    /// usernames containing commas either) and digests or keys with the
    /// wrong shape.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut fields = text.split(',');
        let (Some(username), Some(password_digest), Some(public_hex), None) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return Err(ProtocolError::MalformedControl(
                "login request must have exactly 3 comma-joined fields"
                    .into(),
            ));
        };

        if username.is_empty() {
            return Err(ProtocolError::MalformedControl(
                "empty username".into(),
            ));
        }
        if password_digest.len() != DIGEST_LEN {
            return Err(ProtocolError::MalformedControl(
                "password digest has wrong length".into(),
            ));
        }

        let key_bytes = hex::decode(public_hex).map_err(|_| {
            ProtocolError::MalformedControl(
                "client public key is not valid hex".into(),
            )
        })?;
        let client_public: [u8; 32] =
            key_bytes.try_into().map_err(|_| {
                ProtocolError::MalformedControl(
                    "client public key must be 32 bytes".into(),
                )
            })?;

        Ok(Self {
            username: username.to_string(),
            password_digest: password_digest.to_string(),
            client_public,
        })
    }
}

/// Recognizes a bare invite-digest control frame.
///
/// The redemption sub-protocol sends just the digest of the invite word;
/// the server associates it with the username presented earlier on the
/// same connection.
pub fn parse_invite_digest(text: &str) -> Option<&str> {
    is_digest(text).then_some(text)
}

/// Status strings the server sends on the plaintext control channel.
///
/// These are the only pre-key server → client control messages besides
/// the key frame itself. Rejections are fatal to the connection attempt;
/// `Verified` acknowledges a successful invite redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No account under that username.
    UnknownUser,
    /// The password digest did not match.
    BadCredentials,
    /// The account exists but has not redeemed its invite yet.
    Unverified,
    /// The presented invite digest did not match (or was already consumed).
    InviteMismatch,
    /// The server's session cap is reached.
    ServerFull,
    /// Invite redeemed; the account is now verified.
    Verified,
}

impl Status {
    /// The exact text that goes on the wire.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::UnknownUser => "ERR unknown-user",
            Self::BadCredentials => "ERR bad-credentials",
            Self::Unverified => "ERR unverified",
            Self::InviteMismatch => "ERR invite-mismatch",
            Self::ServerFull => "ERR server-full",
            Self::Verified => "OK verified",
        }
    }

    /// Parses wire text back into a status.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        match text {
            "ERR unknown-user" => Ok(Self::UnknownUser),
            "ERR bad-credentials" => Ok(Self::BadCredentials),
            "ERR unverified" => Ok(Self::Unverified),
            "ERR invite-mismatch" => Ok(Self::InviteMismatch),
            "ERR server-full" => Ok(Self::ServerFull),
            "OK verified" => Ok(Self::Verified),
            other => Err(ProtocolError::MalformedControl(format!(
                "unknown status string: {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

// ---------------------------------------------------------------------------
// Application payload
// ---------------------------------------------------------------------------

/// The post-handshake application payload: one chat message.
///
/// Serialized as the JSON object `{"nickname": ..., "msg": ...}` and then
/// encrypted under the session key before framing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub nickname: String,
    pub msg: String,
}

// =========================================================================
// Tests
// =========================================================================
