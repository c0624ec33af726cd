//! `ConfabServer` builder and accept loop.
//!
//! This is the entry point for running a Confab server. It ties together
//! the layers: transport → protocol → store → crypto → your handler.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use confab_protocol::JsonCodec;
use confab_store::AccountStore;
use confab_transport::{TcpTransport, Transport};

use crate::handler::{MessageHandler, handle_connection};
use crate::{ConfabError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The store
/// carries its own interior lock; the session counter is atomic.
pub(crate) struct ServerState<H: MessageHandler> {
    pub(crate) store: AccountStore,
    pub(crate) handler: H,
    pub(crate) codec: JsonCodec,
    pub(crate) config: ServerConfig,
    pub(crate) active_sessions: AtomicUsize,
}

/// Builder for configuring and starting a Confab server.
///
/// # Example
///
/// ```rust,ignore
/// use confab::{ConfabServer, ServerConfig};
///
/// let server = ConfabServer::builder()
///     .config(ServerConfig::load_or_init("confab.toml")?)
///     .build(my_handler)
///     .await?;
/// server.run().await
/// ```
pub struct ConfabServerBuilder {
    config: ServerConfig,
    store: Option<AccountStore>,
}

impl ConfabServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            store: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Caps the number of simultaneously established sessions.
    pub fn max_users(mut self, max_users: usize) -> Self {
        self.config.max_users = max_users;
        self
    }

    /// Uses an already-open account store instead of opening the one at
    /// `database_path`. Lets tests run against an in-memory store and
    /// embedders share a store with other components.
    pub fn store(mut self, store: AccountStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the server: binds the listener and opens the account store.
    pub async fn build<H: MessageHandler>(
        self,
        handler: H,
    ) -> Result<ConfabServer<H>, ConfabError> {
        let transport = TcpTransport::bind(&self.config.bind_addr).await?;

        let store = match self.store {
            Some(store) => store,
            None => AccountStore::open(&self.config.database_path)?,
        };

        let state = Arc::new(ServerState {
            store,
            handler,
            codec: JsonCodec,
            config: self.config,
            active_sessions: AtomicUsize::new(0),
        });

        Ok(ConfabServer { transport, state })
    }
}

impl Default for ConfabServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Confab server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ConfabServer<H: MessageHandler> {
    transport: TcpTransport,
    state: Arc<ServerState<H>>,
}

impl<H: MessageHandler> ConfabServer<H> {
    /// Creates a new builder.
    pub fn builder() -> ConfabServerBuilder {
        ConfabServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    ///
    /// Useful when binding to port 0 and letting the OS pick.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The account store backing this server.
    ///
    /// Registration happens here, out of band of the wire protocol —
    /// an operator (or test) creates accounts and hands out invite words.
    pub fn store(&self) -> &AccountStore {
        &self.state.store
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), ConfabError> {
        tracing::info!(
            max_users = self.state.config.max_users,
            "Confab server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
