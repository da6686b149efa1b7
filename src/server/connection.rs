//! Per-connection handling context
//!
//! Each accepted stream gets one `Connection`, driven by its own task:
//!
//! 1. read a chunk from the stream
//! 2. feed it to the frame decoder
//! 3. dispatch every complete frame, in arrival order
//!
//! until end-of-stream, a read error, or a rejected frame. Whatever the
//! reason, the stream is then shut down and every subscription the
//! connection holds is purged from the registry.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadHalf};

use crate::error::Result;
use crate::protocol::FrameDecoder;
use crate::registry::{ConnectionId, Subscriber};
use crate::server::config::ServerConfig;
use crate::server::dispatch::Dispatcher;
use crate::session::SessionState;

/// Broker side of one client connection
pub struct Connection<S> {
    session: SessionState,
    reader: ReadHalf<S>,
    subscriber: Subscriber,
    decoder: FrameDecoder,
    dispatcher: Arc<Dispatcher>,
    read_buffer_size: usize,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Create a connection handler for an accepted stream
    pub fn new(
        session_id: u64,
        connection_id: ConnectionId,
        stream: S,
        config: &ServerConfig,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);

        Self {
            session: SessionState::new(session_id, connection_id.clone()),
            reader,
            subscriber: Subscriber::new(connection_id, writer),
            decoder: FrameDecoder::with_limit(config.max_payload_size),
            dispatcher,
            read_buffer_size: config.read_buffer_size.max(1),
        }
    }

    /// Session state
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Run until the stream ends, then clean up
    ///
    /// Clean end-of-stream returns `Ok`. Read failures and rejected frames
    /// are returned after cleanup has completed.
    pub async fn run(&mut self) -> Result<()> {
        self.session.activate();
        self.dispatcher.stats().connection_opened();

        let result = self.read_loop().await;
        self.close().await;

        result
    }

    async fn read_loop(&mut self) -> Result<()> {
        let mut buf = vec![0u8; self.read_buffer_size];

        loop {
            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                tracing::debug!(session_id = self.session.id, "End of stream");
                return Ok(());
            }

            self.session.add_bytes_received(n);
            self.decoder.extend(&buf[..n]);

            while let Some(frame) = self.decoder.next_frame()? {
                self.session.add_frame(frame.command().is_some());
                self.dispatcher.dispatch(&self.subscriber, frame).await;
            }
        }
    }

    async fn close(&mut self) {
        if !self.session.close() {
            return;
        }

        if let Err(e) = self.subscriber.close().await {
            tracing::debug!(
                session_id = self.session.id,
                error = %e,
                "Failed to close connection"
            );
        }

        let removed = self
            .dispatcher
            .registry()
            .unsubscribe_all(&self.session.connection_id)
            .await;
        self.dispatcher.stats().connection_closed();

        let stats = self.session.stats();
        tracing::info!(
            session_id = self.session.id,
            peer = %self.session.connection_id,
            subscriptions_removed = removed,
            bytes = stats.bytes_received,
            frames = stats.frames_received,
            bytes_per_sec = stats.byte_rate(),
            "Connection closed"
        );
    }
}
