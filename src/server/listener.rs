//! Broker listener
//!
//! Handles the TCP accept loop and spawns one task per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::registry::{ConnectionId, RegistryConfig, SubscriptionRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::dispatch::Dispatcher;
use crate::stats::{BrokerStats, BrokerStatsSnapshot};

/// Publish/subscribe broker
pub struct BrokerServer {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl BrokerServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let dispatcher = Dispatcher::new(
            Arc::new(SubscriptionRegistry::with_config(registry_config)),
            Arc::new(BrokerStats::new()),
        );

        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the subscription registry
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        self.dispatcher.registry()
    }

    /// Current broker counters
    pub fn stats(&self) -> BrokerStatsSnapshot {
        self.dispatcher.stats().snapshot()
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Bind the configured address
    ///
    /// Failure to bind is the only fatal server error.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr.as_str()).await?;
        tracing::info!(addr = %listener.local_addr()?, "Broker listening");
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method blocks until the process exits or binding fails.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve_until(listener, shutdown).await
    }

    /// Accept on an already-bound listener until `shutdown` resolves
    ///
    /// Connections already accepted keep running after shutdown.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = match self.try_acquire_permit() {
            Ok(permit) => permit,
            Err(()) => {
                tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                return;
            }
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::warn!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        tracing::info!(peer = %peer_addr, "New connection");

        self.spawn_with_permit(socket, ConnectionId::from(peer_addr), permit);
    }

    fn try_acquire_permit(&self) -> std::result::Result<Option<OwnedSemaphorePermit>, ()> {
        match self.connection_semaphore {
            Some(ref sem) => sem.clone().try_acquire_owned().map(Some).map_err(|_| ()),
            None => Ok(None),
        }
    }

    /// Handle an already-established stream
    ///
    /// Used by the accept loop for TCP sockets; any other bidirectional
    /// stream can be handed in the same way. Counts against
    /// `max_connections` like an accepted socket; if the limit is reached
    /// the stream is dropped and `None` is returned.
    pub fn spawn_connection<S>(&self, stream: S, connection_id: ConnectionId) -> Option<JoinHandle<()>>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        match self.try_acquire_permit() {
            Ok(permit) => Some(self.spawn_with_permit(stream, connection_id, permit)),
            Err(()) => {
                tracing::warn!(peer = %connection_id, "Connection rejected: limit reached");
                None
            }
        }
    }

    fn spawn_with_permit<S>(
        &self,
        stream: S,
        connection_id: ConnectionId,
        permit: Option<OwnedSemaphorePermit>,
    ) -> JoinHandle<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %connection_id,
            "Spawning connection handler"
        );

        let mut connection = Connection::new(
            session_id,
            connection_id,
            stream,
            &self.config,
            Arc::clone(&self.dispatcher),
        );

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = connection.run().await {
                tracing::warn!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }
        })
    }
}
