//! Per-connection handler: handshake, key hand-off, and message delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive the login control frame → parse credentials
//!   2. Authenticate against the account store
//!   3. On success, seal a fresh session key to the client and send it
//!   4. Loop: receive encrypted frames → decrypt → hand to [`MessageHandler`]
//!
//! An unverified account gets one chance to redeem its invite on the same
//! connection; the connection closes after the attempt either way.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use confab_crypto::{SessionKey, decrypt, encrypt, seal_session_key};
use confab_protocol::{
    ChatMessage, Codec, Frame, FrameKind, JsonCodec, LoginRequest, Status,
    parse_invite_digest,
};
use confab_store::{AuthOutcome, RedeemOutcome};
use confab_transport::{Connection, TcpConnection};

use crate::server::ServerState;
use crate::{ConfabError, LoginError};

/// How long the server waits for the login frame, and then for the
/// invite digest on the unverified path.
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives each message a logged-in client sends.
///
/// This is the server application's whole surface: implement it with your
/// delivery logic (broadcast, persistence, moderation) and hand it to the
/// server builder. The [`Peer`] gives you an encrypting reply channel to
/// the sender.
///
/// Futures must be `Send` because handlers run inside spawned tasks.
pub trait MessageHandler: Send + Sync + 'static {
    /// Called for every decrypted, decoded message.
    fn on_message(
        &self,
        peer: &Peer,
        message: ChatMessage,
    ) -> impl Future<Output = Result<(), ConfabError>> + Send;

    /// Called once when a logged-in peer's session ends, whatever the
    /// reason. Never called for connections that failed the handshake.
    fn on_session_closed(
        &self,
        username: &str,
    ) -> impl Future<Output = ()> + Send {
        let _ = username;
        async {}
    }
}

/// A logged-in peer, as seen by a [`MessageHandler`].
pub struct Peer {
    username: String,
    conn: TcpConnection,
    key: SessionKey,
    codec: JsonCodec,
}

impl Peer {
    /// The account name this peer logged in under.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Encrypts and sends one message back to this peer.
    pub async fn send(&self, message: &ChatMessage) -> Result<(), ConfabError> {
        let plaintext = self.codec.encode(message)?;
        let ciphertext = encrypt(&self.key, &plaintext)?;
        self.conn
            .send(&Frame::encrypted(ciphertext).to_bytes())
            .await?;
        Ok(())
    }
}

/// Capacity guard: one live slot per connection attempting the handshake.
///
/// Released on drop, so the count stays correct whether the handler exits
/// through the happy path, a rejection, or an error.
struct SessionSlot<'a> {
    active: &'a AtomicUsize,
}

impl<'a> SessionSlot<'a> {
    fn acquire(active: &'a AtomicUsize, cap: usize) -> Option<Self> {
        active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < cap).then_some(n + 1)
            })
            .ok()
            .map(|_| Self { active })
    }
}

impl Drop for SessionSlot<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<H: MessageHandler>(
    conn: TcpConnection,
    state: Arc<ServerState<H>>,
) -> Result<(), ConfabError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let Some(slot) =
        SessionSlot::acquire(&state.active_sessions, state.config.max_users)
    else {
        tracing::info!(%conn_id, "rejecting connection, server full");
        send_status(&conn, Status::ServerFull).await?;
        let _ = conn.close().await;
        return Ok(());
    };

    let (username, key) = match perform_handshake(&conn, &state).await? {
        Some(established) => established,
        None => {
            // Rejection already sent; nothing more to do.
            let _ = conn.close().await;
            return Ok(());
        }
    };

    tracing::info!(%conn_id, %username, "login complete, session established");

    let peer = Peer {
        username: username.clone(),
        conn: conn.clone(),
        key,
        codec: JsonCodec,
    };

    let result = message_loop(&conn, &state, &peer).await;

    // Free the capacity slot before notifying: by the time the
    // application observes the teardown, a new session can be admitted.
    drop(slot);

    // One notification per established session, success or not.
    state.handler.on_session_closed(&username).await;
    let _ = conn.close().await;
    result
}

/// Runs the login handshake. Returns `Ok(None)` when the client was
/// rejected (a status frame has been sent); `Ok(Some(..))` hands back the
/// username and the freshly issued session key.
async fn perform_handshake<H: MessageHandler>(
    conn: &TcpConnection,
    state: &Arc<ServerState<H>>,
) -> Result<Option<(String, SessionKey)>, ConfabError> {
    let payload = match recv_with_timeout(conn).await? {
        Some(payload) => payload,
        None => return Err(LoginError::ConnectionClosed.into()),
    };

    let frame = Frame::parse(&payload)?;
    if frame.kind != FrameKind::Control {
        return Err(confab_protocol::ProtocolError::InvalidMessage(
            "first frame must be a control frame".into(),
        )
        .into());
    }
    let request = LoginRequest::parse(frame.control_text()?)?;
    tracing::debug!(
        id = %conn.id(),
        username = %request.username,
        "login request received"
    );

    let outcome = state
        .store
        .authenticate(&request.username, &request.password_digest)?;

    let record = match outcome {
        AuthOutcome::Verified(record) => record,
        AuthOutcome::UserNotFound => {
            send_status(conn, Status::UnknownUser).await?;
            return Ok(None);
        }
        AuthOutcome::InvalidCredentials => {
            send_status(conn, Status::BadCredentials).await?;
            return Ok(None);
        }
        AuthOutcome::Unverified => {
            send_status(conn, Status::Unverified).await?;
            run_invite_redemption(conn, state, &request.username).await?;
            return Ok(None);
        }
    };

    // Fresh key per session, sealed to the client's ephemeral public key.
    // The key never travels in the clear.
    let key = SessionKey::generate();
    let blob = seal_session_key(&key, &request.client_public)?;
    conn.send(&Frame::key(blob).to_bytes()).await?;

    Ok(Some((record.username, key)))
}

/// The unverified sub-protocol: wait for one invite-digest frame, attempt
/// the redemption, answer with a status. The connection closes afterwards
/// either way; a verified login starts over on a fresh connection.
async fn run_invite_redemption<H: MessageHandler>(
    conn: &TcpConnection,
    state: &Arc<ServerState<H>>,
    username: &str,
) -> Result<(), ConfabError> {
    let Some(payload) = recv_with_timeout(conn).await? else {
        return Ok(());
    };

    let frame = Frame::parse(&payload)?;
    let digest = match frame
        .control_text()
        .ok()
        .and_then(parse_invite_digest)
    {
        Some(digest) => digest,
        None => {
            send_status(conn, Status::InviteMismatch).await?;
            return Ok(());
        }
    };

    let status = match state.store.redeem_invite(username, digest)? {
        RedeemOutcome::Redeemed => {
            tracing::info!(username, "invite redeemed, account verified");
            Status::Verified
        }
        RedeemOutcome::Mismatch | RedeemOutcome::NotFound => {
            tracing::debug!(username, "invite redemption rejected");
            Status::InviteMismatch
        }
    };
    send_status(conn, status).await
}

/// Receives encrypted frames and hands the decoded messages to the
/// application until the peer disconnects or breaks protocol.
async fn message_loop<H: MessageHandler>(
    conn: &TcpConnection,
    state: &Arc<ServerState<H>>,
    peer: &Peer,
) -> Result<(), ConfabError> {
    loop {
        let payload = match conn.recv().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::info!(
                    username = %peer.username,
                    "connection closed cleanly"
                );
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(
                    username = %peer.username,
                    error = %e,
                    "recv error"
                );
                return Err(e.into());
            }
        };

        let frame = Frame::parse(&payload)?;
        if frame.kind != FrameKind::Encrypted {
            // Plaintext after login is a protocol breach, not a request.
            return Err(confab_protocol::ProtocolError::InvalidMessage(
                "only encrypted frames are accepted after login".into(),
            )
            .into());
        }

        let plaintext = decrypt(&peer.key, &frame.body)?;
        let message: ChatMessage = state.codec.decode(&plaintext)?;
        state.handler.on_message(peer, message).await?;
    }
}

async fn send_status(
    conn: &TcpConnection,
    status: Status,
) -> Result<(), ConfabError> {
    conn.send(&Frame::control(status.as_wire()).to_bytes())
        .await?;
    Ok(())
}

async fn recv_with_timeout(
    conn: &TcpConnection,
) -> Result<Option<Vec<u8>>, ConfabError> {
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(received) => Ok(received?),
        Err(_) => Err(LoginError::TimedOut.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_slot_acquire_respects_cap() {
        let active = AtomicUsize::new(0);

        let first = SessionSlot::acquire(&active, 2);
        let second = SessionSlot::acquire(&active, 2);
        assert!(first.is_some());
        assert!(second.is_some());
        assert!(SessionSlot::acquire(&active, 2).is_none());

        drop(first);
        assert!(SessionSlot::acquire(&active, 2).is_some());
    }

    #[test]
    fn test_session_slot_released_on_drop() {
        let active = AtomicUsize::new(0);
        {
            let _slot = SessionSlot::acquire(&active, 1).unwrap();
            assert_eq!(active.load(Ordering::Acquire), 1);
        }
        assert_eq!(active.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_session_slot_zero_cap_rejects_everyone() {
        let active = AtomicUsize::new(0);
        assert!(SessionSlot::acquire(&active, 0).is_none());
    }
}
