//! Broker client
//!
//! One connection, used either for publishing or for a single blocking
//! subscription. While a subscription is active every other command fails
//! with [`Error::ClientSubscribed`] instead of being sent, since pushed
//! frames and command traffic share the stream.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use juju_rs::client::{Client, ClientConfig};
//!
//! # async fn example() -> juju_rs::error::Result<()> {
//! let client = Arc::new(Client::new(ClientConfig::default()));
//! client.connect("").await?;
//!
//! let handle = client.unsubscribe_handle();
//! client
//!     .subscribe("alerts", move |delivery| {
//!         println!("{}: {:?}", delivery.channel, delivery.payload);
//!         handle.unsubscribe();
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::protocol::{decode_identifier, encode, encode_identifier, Command, FrameDecoder};

use super::config::ClientConfig;
use super::subscription::{Delivery, UnsubscribeHandle, NO_SUBSCRIPTION};

/// Read side of the connection
///
/// The decoder lives as long as the connection so a push frame split across
/// two subscriptions is still reassembled from its first byte.
struct Inbound {
    reader: OwnedReadHalf,
    decoder: FrameDecoder,
}

/// Clears the active subscription on exit, unless a newer one took over
struct ActiveRun<'a> {
    current: &'a AtomicU64,
    run: u64,
}

impl ActiveRun<'_> {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.run
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let _ = self.current.compare_exchange(
            self.run,
            NO_SUBSCRIPTION,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Publish/subscribe client
pub struct Client {
    config: ClientConfig,
    inbound: Mutex<Option<Inbound>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: AtomicBool,
    /// Id of the active subscription, `NO_SUBSCRIPTION` when idle
    subscription: Arc<AtomicU64>,
    next_run: AtomicU64,
}

impl Client {
    /// Create a disconnected client
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            inbound: Mutex::new(None),
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
            subscription: Arc::new(AtomicU64::new(NO_SUBSCRIPTION)),
            next_run: AtomicU64::new(NO_SUBSCRIPTION + 1),
        }
    }

    /// Connect to a broker
    ///
    /// An empty address uses the configured one (`localhost:9261` by
    /// default). Reconnecting replaces any previous connection.
    pub async fn connect(&self, addr: &str) -> Result<()> {
        if self.is_subscribed() {
            return Err(Error::ClientSubscribed);
        }

        let addr = self.config.resolve_addr(addr);
        let stream = TcpStream::connect(addr).await?;

        if self.config.tcp_nodelay {
            stream.set_nodelay(true)?;
        }

        let (reader, writer) = stream.into_split();
        *self.writer.lock().await = Some(writer);
        *self.inbound.lock().await = Some(Inbound {
            reader,
            decoder: FrameDecoder::with_limit(self.config.max_payload_size),
        });
        self.connected.store(true, Ordering::Release);

        tracing::debug!(addr = addr, "Connected to broker");
        Ok(())
    }

    /// Close the connection
    ///
    /// Fails with [`Error::ClientSubscribed`] while a subscription is
    /// running; unsubscribe first.
    pub async fn disconnect(&self) -> Result<()> {
        if self.is_subscribed() {
            return Err(Error::ClientSubscribed);
        }

        self.connected.store(false, Ordering::Release);

        // Shut the write side first: a subscription loop still draining
        // after unsubscribe wakes on the broker's close and drops the reader
        let result = match self.writer.lock().await.take() {
            Some(mut writer) => writer.shutdown().await.map_err(Error::from),
            None => Err(Error::NotConnected),
        };
        self.inbound.lock().await.take();

        result
    }

    /// Publish a payload to a channel
    ///
    /// `exclusive` routes the message to a single subscriber of the channel
    /// instead of all of them.
    pub async fn publish(&self, channel: &str, data: &[u8], exclusive: bool) -> Result<()> {
        if self.is_subscribed() {
            return Err(Error::ClientSubscribed);
        }

        self.send(encode(Command::publish(exclusive), channel, data))
            .await
    }

    /// Subscribe to a channel and deliver messages until unsubscribed
    ///
    /// Blocks for the lifetime of the subscription. Each message runs
    /// `callback` on its own task, so a slow callback never stalls frame
    /// reassembly and callbacks may run out of order. Pushes for channels
    /// subscribed earlier on this connection are skipped.
    ///
    /// After an unsubscribe a new subscription can start right away; it
    /// waits for the previous loop to hand over the connection.
    ///
    /// Returns `Ok(())` once [`unsubscribe`](Self::unsubscribe) is observed
    /// and [`Error::ConnectionClosed`] if the broker closes the stream.
    pub async fn subscribe<F>(&self, channel: &str, callback: F) -> Result<()>
    where
        F: Fn(Delivery) + Send + Sync + 'static,
    {
        let run = self.next_run.fetch_add(1, Ordering::Relaxed);
        if self
            .subscription
            .compare_exchange(NO_SUBSCRIPTION, run, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::ClientSubscribed);
        }

        let active = ActiveRun {
            current: &*self.subscription,
            run,
        };

        self.run_subscription(channel, &active, Arc::new(callback))
            .await
    }

    async fn run_subscription<F>(
        &self,
        channel: &str,
        active: &ActiveRun<'_>,
        callback: Arc<F>,
    ) -> Result<()>
    where
        F: Fn(Delivery) + Send + Sync + 'static,
    {
        let mut inbound = self.inbound.lock().await;
        let inbound = inbound.as_mut().ok_or(Error::NotConnected)?;

        if !active.is_current() {
            return Ok(());
        }

        self.send(encode(Command::Subscribe, channel, b"")).await?;
        tracing::debug!(channel = channel, "Subscribed");

        // Pushes carry the identifier as it went over the wire
        let wire_channel = decode_identifier(&encode_identifier(channel));
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];

        while active.is_current() {
            let n = inbound.reader.read(&mut buf).await?;
            if n == 0 {
                if active.is_current() {
                    return Err(Error::ConnectionClosed);
                }
                break;
            }

            inbound.decoder.extend(&buf[..n]);

            while let Some(frame) = inbound.decoder.next_frame()? {
                if frame.channel != wire_channel {
                    tracing::trace!(channel = %frame.channel, "Skipping push for another channel");
                    continue;
                }

                let delivery = Delivery {
                    channel: frame.channel,
                    payload: frame.payload,
                };
                let callback = Arc::clone(&callback);
                tokio::spawn(async move { callback(delivery) });
            }
        }

        tracing::debug!(channel = channel, "Unsubscribed");
        Ok(())
    }

    /// Signal the running subscription to stop
    ///
    /// Takes effect after the subscription's current read returns.
    pub fn unsubscribe(&self) {
        self.subscription.store(NO_SUBSCRIPTION, Ordering::Release);
    }

    /// Handle that can end the subscription from elsewhere
    pub fn unsubscribe_handle(&self) -> UnsubscribeHandle {
        UnsubscribeHandle::new(Arc::clone(&self.subscription))
    }

    /// Check if a subscription is active
    pub fn is_subscribed(&self) -> bool {
        self.subscription.load(Ordering::Acquire) != NO_SUBSCRIPTION
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn send(&self, frame: Bytes) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(Error::NotConnected)?;

        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }
}
