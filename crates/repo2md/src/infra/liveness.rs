//! Session liveness channel.
//!
//! The backend keeps per-session clones only while the session pings. A background task sends
//! `ping` on a fixed interval, counts `pong` replies, and sends `disconnect` on teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const PING: &str = "ping";
const PONG: &str = "pong";
const DISCONNECT: &str = "disconnect";
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("liveness transport failed: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("liveness channel closed")]
    Closed,
}

/// Text channel to the session service.
#[async_trait]
pub trait LivenessTransport: Send {
    async fn send_text(&mut self, text: &str) -> Result<(), LivenessError>;

    /// Next text frame, or `None` once the peer closed the channel.
    async fn next_text(&mut self) -> Option<Result<String, LivenessError>>;

    async fn close(&mut self) -> Result<(), LivenessError>;
}

/// WebSocket-backed liveness transport.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    pub async fn connect(url: &str) -> Result<Self, LivenessError> {
        let (stream, _) = connect_async(url).await?;
        tracing::info!(url, "liveness channel connected");
        Ok(Self { stream })
    }
}

#[async_trait]
impl LivenessTransport for WebSocketTransport {
    async fn send_text(&mut self, text: &str) -> Result<(), LivenessError> {
        self.stream.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String, LivenessError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), LivenessError> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Counters exposed by a running heartbeat.
#[derive(Debug, Default)]
pub struct HeartbeatStats {
    pings: AtomicU64,
    pongs: AtomicU64,
}

impl HeartbeatStats {
    pub fn pings(&self) -> u64 {
        self.pings.load(Ordering::Relaxed)
    }

    pub fn pongs(&self) -> u64 {
        self.pongs.load(Ordering::Relaxed)
    }
}

/// Handle to the background heartbeat task.
pub struct Heartbeat {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    stats: Arc<HeartbeatStats>,
}

impl Heartbeat {
    /// Start pinging over `transport` every `interval` on `runtime`.
    pub fn start<T>(runtime: &Handle, transport: T, interval: Duration) -> Self
    where
        T: LivenessTransport + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stats = Arc::new(HeartbeatStats::default());
        let task = runtime.spawn(run(transport, interval, shutdown_rx, stats.clone()));
        Self {
            shutdown: Some(shutdown_tx),
            task,
            stats,
        }
    }

    pub fn stats(&self) -> &HeartbeatStats {
        &self.stats
    }

    /// Whether the background task has stopped on its own.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Notify the service of disconnect and wait briefly for the channel to close.
    pub async fn disconnect(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if tokio::time::timeout(TEARDOWN_TIMEOUT, &mut self.task)
            .await
            .is_err()
        {
            tracing::warn!("liveness channel did not close in time");
            self.task.abort();
        }
    }
}

async fn run<T: LivenessTransport>(
    mut transport: T,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
    stats: Arc<HeartbeatStats>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first ping goes out after one interval.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(err) = transport.send_text(DISCONNECT).await {
                    tracing::debug!(error = %err, "disconnect notice not delivered");
                }
                if let Err(err) = transport.close().await {
                    tracing::debug!(error = %err, "liveness close failed");
                }
                tracing::info!("liveness channel closed");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = transport.send_text(PING).await {
                    tracing::warn!(error = %err, "heartbeat ping failed");
                    break;
                }
                stats.pings.fetch_add(1, Ordering::Relaxed);
            }
            message = transport.next_text() => match message {
                Some(Ok(text)) if text == PONG => {
                    stats.pongs.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!("pong received");
                }
                Some(Ok(other)) => {
                    tracing::debug!(message = %other, "ignoring liveness message");
                }
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "liveness channel error");
                    break;
                }
                None => {
                    tracing::info!("liveness channel closed by peer");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    struct ChannelTransport {
        outgoing: mpsc::UnboundedSender<String>,
        incoming: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl LivenessTransport for ChannelTransport {
        async fn send_text(&mut self, text: &str) -> Result<(), LivenessError> {
            self.outgoing
                .send(text.to_string())
                .map_err(|_| LivenessError::Closed)
        }

        async fn next_text(&mut self) -> Option<Result<String, LivenessError>> {
            self.incoming.recv().await.map(Ok)
        }

        async fn close(&mut self) -> Result<(), LivenessError> {
            self.incoming.close();
            Ok(())
        }
    }

    fn transport() -> (
        ChannelTransport,
        mpsc::UnboundedReceiver<String>,
        mpsc::UnboundedSender<String>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            ChannelTransport {
                outgoing: out_tx,
                incoming: in_rx,
            },
            out_rx,
            in_tx,
        )
    }

    async fn next_sent(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("message within timeout")
            .expect("channel open")
    }

    #[tokio::test]
    async fn pings_on_interval_and_counts_pongs() {
        let (transport, mut sent, replies) = transport();
        let heartbeat = Heartbeat::start(&Handle::current(), transport, Duration::from_millis(20));

        assert_eq!(next_sent(&mut sent).await, "ping");
        replies.send("pong".into()).unwrap();
        assert_eq!(next_sent(&mut sent).await, "ping");

        assert!(heartbeat.stats().pings() >= 2);
        assert!(heartbeat.stats().pongs() >= 1);
        heartbeat.disconnect().await;
    }

    #[tokio::test]
    async fn teardown_sends_disconnect() {
        let (transport, mut sent, _replies) = transport();
        let heartbeat = Heartbeat::start(&Handle::current(), transport, Duration::from_secs(60));

        heartbeat.disconnect().await;
        assert_eq!(next_sent(&mut sent).await, "disconnect");
    }

    #[tokio::test]
    async fn stops_when_peer_closes() {
        let (transport, _sent, replies) = transport();
        let heartbeat = Heartbeat::start(&Handle::current(), transport, Duration::from_secs(60));
        drop(replies);

        tokio::time::timeout(Duration::from_secs(2), async {
            while !heartbeat.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("heartbeat stops after peer close");
    }
}
