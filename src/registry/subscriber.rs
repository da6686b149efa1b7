//! Connection identity and outbound handles
//!
//! A [`Subscriber`] is the write side of one connection, shared between the
//! registry and every publishing context that delivers to it. Writes are
//! serialized by a mutex so concurrent publishes never interleave frames.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Opaque identity of a connection
///
/// TCP connections are identified by their peer address. Other transports
/// (or deployments where peer addresses collide) can supply any unique
/// string, e.g. a generated session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(Arc<str>);

impl ConnectionId {
    /// Create an identity from an arbitrary string
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Identity string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SocketAddr> for ConnectionId {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Outbound handle for one connection
#[derive(Clone)]
pub struct Subscriber {
    id: ConnectionId,
    writer: Arc<Mutex<BoxedWriter>>,
}

impl Subscriber {
    /// Wrap the write half of a connection
    pub fn new<W>(id: ConnectionId, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Connection identity
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Write one encoded frame and flush it
    pub async fn send(&self, frame: &Bytes) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(frame).await?;
        writer.flush().await
    }

    /// Shut down the write side
    ///
    /// Shutting down an already-closed stream is not an error for callers;
    /// they log and move on.
    pub async fn close(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}
