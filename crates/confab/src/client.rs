//! `ConfabClient`: connect, log in, chat.
//!
//! The client walks the same state machine the server enforces:
//!
//! ```text
//! disconnected ──connect──→ connected ──login──→ established
//!                              │                     │
//!                              └──redeem_invite──────┘ (connection
//!                                                       closes after)
//! ```
//!
//! `login` and `redeem_invite` both consume the current connection: a
//! rejection (or a finished redemption) leaves the client disconnected,
//! and the caller reconnects before trying again.

use std::path::PathBuf;
use std::time::Duration;

use confab_crypto::HandshakeKeyPair;
use confab_protocol::{
    ChatMessage, Frame, FrameKind, LoginRequest, Status, digest,
};
use confab_transport::{Connection, TcpConnection};

use crate::logging::Redacted;
use crate::session::{EventCallback, Session};
use crate::{ClientConfig, ConfabError, LoginError};

/// How long the client waits for each handshake reply.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// A Confab chat client.
pub struct ConfabClient {
    config: ClientConfig,
    config_path: Option<PathBuf>,
    conn: Option<TcpConnection>,
    session: Option<Session>,
}

impl ConfabClient {
    /// Creates a client from an in-memory configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            config_path: None,
            conn: None,
            session: None,
        }
    }

    /// Creates a client from a TOML config file, writing defaults if the
    /// file does not exist yet. Settings changed later (for example by
    /// [`set_password`](Self::set_password)) are saved back to the file.
    pub fn from_config_file(
        path: impl Into<PathBuf>,
    ) -> Result<Self, ConfabError> {
        let path = path.into();
        let config = ClientConfig::load_or_init(&path)?;
        Ok(Self {
            config,
            config_path: Some(path),
            conn: None,
            session: None,
        })
    }

    /// The current configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether a login has completed and the session is live.
    pub fn is_established(&self) -> bool {
        self.session.is_some()
    }

    /// Opens a connection to the given server, adopting the arguments as
    /// the new configured endpoint (persisted when the client was loaded
    /// from a config file).
    ///
    /// Retries up to `attempts` times. Errors if a connection or session
    /// already exists; call [`disconnect`](Self::disconnect) first to
    /// start over.
    pub async fn connect(
        &mut self,
        server_ip: &str,
        port: u16,
        attempts: u32,
    ) -> Result<(), ConfabError> {
        self.config.server_ip = server_ip.to_string();
        self.config.port = port;
        self.config.connect_attempts = attempts;
        if let Some(path) = &self.config_path {
            self.config.save(path)?;
        }
        self.reconnect().await
    }

    /// Opens a connection to the server already in the configuration.
    /// Used to dial again after a rejection or a redemption closed the
    /// previous connection.
    pub async fn reconnect(&mut self) -> Result<(), ConfabError> {
        if self.conn.is_some() || self.session.is_some() {
            return Err(ConfabError::AlreadyConnected);
        }

        let addr =
            format!("{}:{}", self.config.server_ip, self.config.port);
        let conn =
            TcpConnection::connect(&addr, self.config.connect_attempts)
                .await?;
        self.conn = Some(conn);
        Ok(())
    }

    /// Logs in with the configured credentials and starts the encrypted
    /// session. `on_event` receives every incoming message and, last, a
    /// close notification.
    ///
    /// The password is digested locally; only the digest travels. On
    /// rejection the server closes the connection, so the client returns
    /// to the disconnected state and surfaces the [`LoginError`].
    pub async fn login(
        &mut self,
        on_event: EventCallback,
    ) -> Result<(), ConfabError> {
        let conn = self.conn.take().ok_or(ConfabError::NotConnected)?;

        let keypair = HandshakeKeyPair::generate();
        let request = LoginRequest {
            username: self.config.username.clone(),
            password_digest: digest(&self.config.password),
            client_public: keypair.public(),
        };
        tracing::debug!(
            username = %request.username,
            password = %Redacted(&self.config.password),
            "sending login request"
        );
        conn.send(&Frame::control(request.to_wire()).to_bytes())
            .await?;

        let reply = recv_reply(&conn).await?;
        match reply.kind {
            FrameKind::Key => {
                let key = keypair.open(&reply.body)?;
                self.session =
                    Some(Session::spawn(conn, key, on_event));
                Ok(())
            }
            FrameKind::Control => {
                let status = Status::parse(reply.control_text()?)?;
                match LoginError::from_status(status) {
                    Some(rejection) => Err(rejection.into()),
                    None => Err(
                        confab_protocol::ProtocolError::InvalidMessage(
                            format!(
                                "unexpected status during login: {status}"
                            ),
                        )
                        .into(),
                    ),
                }
            }
            FrameKind::Encrypted => {
                Err(confab_protocol::ProtocolError::InvalidMessage(
                    "encrypted frame before key hand-off".into(),
                )
                .into())
            }
        }
    }

    /// Redeems the invite word for the configured account.
    ///
    /// Runs a login attempt expecting the unverified rejection, then
    /// presents the invite word's digest. The connection is closed
    /// afterwards either way; on success, reconnect and
    /// [`login`](Self::login) normally.
    ///
    /// If the account turns out to be verified already, the redemption is
    /// a no-op success.
    pub async fn redeem_invite(
        &mut self,
        invite_word: &str,
    ) -> Result<(), ConfabError> {
        let conn = self.conn.take().ok_or(ConfabError::NotConnected)?;

        let keypair = HandshakeKeyPair::generate();
        let request = LoginRequest {
            username: self.config.username.clone(),
            password_digest: digest(&self.config.password),
            client_public: keypair.public(),
        };
        conn.send(&Frame::control(request.to_wire()).to_bytes())
            .await?;

        let reply = recv_reply(&conn).await?;
        match reply.kind {
            // Already verified: the server issued a key. Discard the
            // session it started; the caller asked for a redemption, not
            // a login.
            FrameKind::Key => {
                let _ = conn.close().await;
                return Ok(());
            }
            FrameKind::Control => {
                let status = Status::parse(reply.control_text()?)?;
                if status != Status::Unverified {
                    return match LoginError::from_status(status) {
                        Some(rejection) => Err(rejection.into()),
                        None => Err(
                            confab_protocol::ProtocolError::InvalidMessage(
                                format!(
                                    "unexpected status during redemption: \
                                     {status}"
                                ),
                            )
                            .into(),
                        ),
                    };
                }
            }
            FrameKind::Encrypted => {
                return Err(
                    confab_protocol::ProtocolError::InvalidMessage(
                        "encrypted frame before key hand-off".into(),
                    )
                    .into(),
                );
            }
        }

        // The server is now waiting for exactly one invite digest.
        conn.send(
            &Frame::control(digest(invite_word)).to_bytes(),
        )
        .await?;

        let reply = recv_reply(&conn).await?;
        let status = Status::parse(reply.control_text()?)?;
        let _ = conn.close().await;
        // from_status is None exactly for the Verified acknowledgement.
        match LoginError::from_status(status) {
            None => {
                tracing::info!(
                    username = %self.config.username,
                    "invite redeemed"
                );
                Ok(())
            }
            Some(rejection) => Err(rejection.into()),
        }
    }

    /// Encrypts and sends one chat message under the configured nickname.
    pub async fn send(&self, text: &str) -> Result<(), ConfabError> {
        let session =
            self.session.as_ref().ok_or(ConfabError::NotConnected)?;
        session
            .send(&ChatMessage {
                nickname: self.config.nickname.clone(),
                msg: text.to_string(),
            })
            .await
    }

    /// Ends the session (if any) and drops the connection.
    pub async fn disconnect(&mut self) -> Result<(), ConfabError> {
        if let Some(mut session) = self.session.take() {
            session.close().await?;
        }
        if let Some(conn) = self.conn.take() {
            let _ = conn.close().await;
        }
        Ok(())
    }

    /// Updates the stored password, persisting it when the client was
    /// loaded from a config file. Takes effect at the next login.
    pub fn set_password(
        &mut self,
        new_password: &str,
    ) -> Result<(), ConfabError> {
        self.config.password = new_password.to_string();
        if let Some(path) = &self.config_path {
            self.config.save(path)?;
        }
        Ok(())
    }
}

/// Receives and parses the next handshake reply, mapping a clean close
/// or a timeout to the corresponding login failure.
async fn recv_reply(conn: &TcpConnection) -> Result<Frame, ConfabError> {
    let received =
        match tokio::time::timeout(REPLY_TIMEOUT, conn.recv()).await {
            Ok(received) => received?,
            Err(_) => return Err(LoginError::TimedOut.into()),
        };
    match received {
        Some(payload) => Ok(Frame::parse(&payload)?),
        None => Err(LoginError::ConnectionClosed.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        ClientConfig {
            nickname: "al".into(),
            username: "alice".into(),
            password: "pw1".into(),
            server_ip: "127.0.0.1".into(),
            port: 1, // nothing listens here
            connect_attempts: 1,
        }
    }

    #[tokio::test]
    async fn test_send_without_session_errors() {
        let client = ConfabClient::new(test_config());
        assert!(matches!(
            client.send("hello").await,
            Err(ConfabError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_login_without_connection_errors() {
        let mut client = ConfabClient::new(test_config());
        let callback: EventCallback = std::sync::Arc::new(|_| {});
        assert!(matches!(
            client.login(callback).await,
            Err(ConfabError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces_transport_error() {
        let mut client = ConfabClient::new(test_config());
        assert!(matches!(
            client.reconnect().await,
            Err(ConfabError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_persists_endpoint_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        let mut client = ConfabClient::from_config_file(&path).unwrap();

        // Nothing listens on the target; the override must stick anyway.
        let result = client.connect("127.0.0.1", 1, 1).await;
        assert!(matches!(result, Err(ConfabError::Transport(_))));

        assert_eq!(client.config().server_ip, "127.0.0.1");
        assert_eq!(client.config().port, 1);
        assert_eq!(client.config().connect_attempts, 1);

        let reloaded = ClientConfig::load(&path).unwrap();
        assert_eq!(reloaded.server_ip, "127.0.0.1");
        assert_eq!(reloaded.port, 1);
        assert_eq!(reloaded.connect_attempts, 1);
    }

    #[test]
    fn test_set_password_persists_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");

        let mut client = ConfabClient::from_config_file(&path).unwrap();
        client.set_password("new-secret").unwrap();

        let reloaded = ClientConfig::load(&path).unwrap();
        assert_eq!(reloaded.password, "new-secret");
    }
}
