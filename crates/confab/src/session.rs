//! The client's established session: encrypted duplex over one connection.
//!
//! A [`Session`] exists only after a successful login. It owns the
//! connection and the session key, runs a background receive loop that
//! decrypts incoming frames into [`ChatMessage`]s, and encrypts outgoing
//! messages on [`send`](Session::send).
//!
//! The receive loop ends for exactly one of three reasons — the peer
//! closed, an error, or a local shutdown — and reports it with a single
//! [`SessionEvent::Closed`].

use std::sync::Arc;

use confab_crypto::{SessionKey, decrypt, encrypt};
use confab_protocol::{ChatMessage, Codec, Frame, FrameKind, JsonCodec};
use confab_transport::{Connection, TcpConnection};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ConfabError;

/// What the receive loop reports back to the application.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A decrypted, decoded message from the peer.
    Message(ChatMessage),
    /// The session ended. Sent exactly once, last.
    Closed { reason: String },
}

/// Callback invoked by the receive loop for each event.
pub type EventCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// One established, encrypted session.
pub struct Session {
    conn: TcpConnection,
    key: SessionKey,
    codec: JsonCodec,
    shutdown_tx: watch::Sender<bool>,
    receive_task: JoinHandle<()>,
}

impl Session {
    /// Starts a session over an authenticated connection, spawning the
    /// receive loop.
    pub fn spawn(
        conn: TcpConnection,
        key: SessionKey,
        on_event: EventCallback,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let receive_task = tokio::spawn(receive_loop(
            conn.clone(),
            key.clone(),
            JsonCodec,
            shutdown_rx,
            on_event,
        ));

        Self {
            conn,
            key,
            codec: JsonCodec,
            shutdown_tx,
            receive_task,
        }
    }

    /// Encrypts and sends one message to the peer.
    pub async fn send(&self, message: &ChatMessage) -> Result<(), ConfabError> {
        let plaintext = self.codec.encode(message)?;
        let ciphertext = encrypt(&self.key, &plaintext)?;
        self.conn
            .send(&Frame::encrypted(ciphertext).to_bytes())
            .await?;
        Ok(())
    }

    /// Shuts down the receive loop and closes the connection.
    pub async fn close(&mut self) -> Result<(), ConfabError> {
        let _ = self.shutdown_tx.send(true);
        let close_result = self.conn.close().await;
        let _ = (&mut self.receive_task).await;
        close_result?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Signal the receive loop even if close() was never called. The
        // task notices on its next select iteration.
        let _ = self.shutdown_tx.send(true);
    }
}

/// Receives frames until shutdown, close, or error; emits events.
async fn receive_loop(
    conn: TcpConnection,
    key: SessionKey,
    codec: JsonCodec,
    mut shutdown_rx: watch::Receiver<bool>,
    on_event: EventCallback,
) {
    let reason = loop {
        let payload = tokio::select! {
            _ = shutdown_rx.changed() => break "shutdown".to_string(),
            received = conn.recv() => match received {
                Ok(Some(payload)) => payload,
                Ok(None) => break "peer closed the connection".to_string(),
                Err(e) => break format!("receive failed: {e}"),
            },
        };

        let frame = match Frame::parse(&payload) {
            Ok(frame) => frame,
            Err(e) => break format!("bad frame: {e}"),
        };
        if frame.kind != FrameKind::Encrypted {
            break format!("unexpected {:?} frame after login", frame.kind);
        }

        let plaintext = match decrypt(&key, &frame.body) {
            Ok(plaintext) => plaintext,
            Err(e) => break format!("decrypt failed: {e}"),
        };
        match codec.decode::<ChatMessage>(&plaintext) {
            Ok(message) => on_event(SessionEvent::Message(message)),
            Err(e) => break format!("decode failed: {e}"),
        }
    };

    tracing::debug!(id = %conn.id(), reason = %reason, "session receive loop ended");
    on_event(SessionEvent::Closed { reason });
}
