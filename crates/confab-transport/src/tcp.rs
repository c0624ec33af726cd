//! TCP transport with length-prefixed framing.
//!
//! Wire format: `u32` big-endian payload length, then exactly that many
//! payload bytes. A zero-length payload is a valid frame (the 4-byte zero
//! prefix still travels).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Upper bound on a single frame's payload.
///
/// A corrupt or hostile length prefix (e.g. `0xFFFFFFFF`) must fail fast,
/// before any allocation happens for it.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// A TCP-based [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    ///
    /// Useful when binding to port 0 and letting the OS pick.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::from_stream(stream);
        tracing::debug!(id = %conn.id(), %addr, "accepted TCP connection");
        Ok(conn)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// One framed TCP connection.
///
/// The read and write halves are locked independently: the session's
/// receive loop can sit in a blocking `recv` without ever stalling a
/// concurrent `send` from the owning side. There is exactly one logical
/// writer per session, so no ordering guarantees beyond the write-half
/// mutex are needed.
///
/// Cloning is cheap and shares the underlying socket.
#[derive(Clone)]
pub struct TcpConnection {
    id: ConnectionId,
    reader: Arc<Mutex<OwnedReadHalf>>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl TcpConnection {
    fn from_stream(stream: TcpStream) -> Self {
        // Frames are small and latency matters more than throughput.
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        Self {
            id: ConnectionId::new(
                NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            ),
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Connects to a remote peer, retrying up to `attempts` times.
    ///
    /// No backoff beyond decrementing the counter; each attempt is bounded
    /// only by the OS-level connect timeout. Callers needing a hard
    /// deadline should wrap this in their own timeout.
    pub async fn connect(
        addr: &str,
        attempts: u32,
    ) -> Result<Self, TransportError> {
        let budget = attempts.max(1);
        let mut remaining = budget;
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    let conn = Self::from_stream(stream);
                    tracing::debug!(id = %conn.id(), addr, "connected");
                    return Ok(conn);
                }
                Err(e) => {
                    remaining -= 1;
                    if remaining == 0 {
                        return Err(TransportError::ConnectFailed {
                            attempts: budget,
                            source: e,
                        });
                    }
                    tracing::debug!(
                        addr,
                        remaining,
                        error = %e,
                        "connect attempt failed, retrying"
                    );
                }
            }
        }
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if data.len() > MAX_FRAME_LEN {
            return Err(TransportError::Framing(format!(
                "outgoing frame of {} bytes exceeds maximum",
                data.len()
            )));
        }
        let prefix = (data.len() as u32).to_be_bytes();

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&prefix)
            .await
            .map_err(TransportError::SendFailed)?;
        writer
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;

        // Read the length prefix in a manual loop so that a clean close
        // before the first byte (end of stream) is distinguishable from a
        // close inside the prefix (framing violation).
        let mut prefix = [0u8; 4];
        let mut filled = 0;
        while filled < prefix.len() {
            let n = reader
                .read(&mut prefix[filled..])
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(TransportError::Framing(
                    "stream closed inside length prefix".into(),
                ));
            }
            filled += n;
        }

        let len = u32::from_be_bytes(prefix) as usize;
        if len > MAX_FRAME_LEN {
            return Err(TransportError::Framing(format!(
                "frame length {len} exceeds maximum of {MAX_FRAME_LEN}"
            )));
        }

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::Framing(
                    "stream closed inside frame payload".into(),
                )
            } else {
                TransportError::ReceiveFailed(e)
            }
        })?;

        Ok(Some(payload))
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
