//! WebSocket transport.
//!
//! Owns the single persistent connection for the application lifetime:
//! connect, heartbeat, reconnect with capped exponential backoff, and
//! inbound frame dispatch in network-arrival order. Outbound sends are not
//! queued across a downed connection and are never retried by the transport;
//! callers own their UI feedback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use datachat_protocol::{HEARTBEAT_PING, HEARTBEAT_PONG};

use crate::error::ClientError;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Reconnect attempts before the transport surfaces a fatal event instead
/// of spinning against a persistently-down backend.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 30_000;

/// Receives transport callbacks; implemented by the client core.
pub trait FrameSink: Send + Sync + 'static {
    /// Connection established (initial or after reconnect).
    fn on_connected(&self);
    /// One inbound text frame, in network-arrival order. Heartbeat acks
    /// never reach this.
    fn on_frame(&self, raw: &str);
    /// Connection closed or errored; reconnection is already scheduled.
    /// Must unblock anything awaiting a terminal frame.
    fn on_disconnect(&self, reason: &str);
    /// The reconnect policy gave up.
    fn on_reconnect_gave_up(&self, attempts: u32);
}

/// One logical connection to the backend WebSocket endpoint.
pub struct Transport {
    url: String,
    outbound_tx: mpsc::Sender<String>,
    outbound_rx: Mutex<Option<mpsc::Receiver<String>>>,
    running: AtomicBool,
    connected: AtomicBool,
}

impl Transport {
    pub fn new(url: impl Into<String>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        Self {
            url: url.into(),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            running: AtomicBool::new(false),
            connected: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Establish the connection if absent. Idempotent: the first call spawns
    /// the connection task; later calls while it runs are no-ops. After the
    /// reconnect policy has given up, a further call starts a fresh cycle.
    pub fn connect(self: &Arc<Self>, sink: Arc<dyn FrameSink>) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!(
                component = "transport",
                event = "ws.connect.already_running",
                "connect() is idempotent; connection task already running"
            );
            return;
        }
        let receiver = self
            .outbound_rx
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        let Some(outbound_rx) = receiver else {
            self.running.store(false, Ordering::SeqCst);
            return;
        };
        tokio::spawn(run_loop(Arc::clone(self), outbound_rx, sink));
    }

    /// Serialize-and-transmit path used by the dispatcher. Fails when the
    /// connection is down; the payload is not queued or retried.
    pub fn send_text(&self, text: String) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.outbound_tx
            .try_send(text)
            .map_err(|_| ClientError::NotConnected)
    }
}

/// Delay before reconnect attempt `attempt` (1-based): doubling from 500ms,
/// capped at 30s.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << exp);
    Duration::from_millis(ms.min(BACKOFF_CAP_MS))
}

async fn run_loop(
    transport: Arc<Transport>,
    mut outbound_rx: mpsc::Receiver<String>,
    sink: Arc<dyn FrameSink>,
) {
    let mut attempts: u32 = 0;
    loop {
        match connect_async(transport.url.as_str()).await {
            Ok((stream, _)) => {
                attempts = 0;
                transport.connected.store(true, Ordering::SeqCst);
                info!(
                    component = "transport",
                    event = "ws.connected",
                    url = %transport.url,
                    "WebSocket connection opened"
                );
                sink.on_connected();

                let reason = run_connection(stream, &mut outbound_rx, sink.as_ref()).await;
                transport.connected.store(false, Ordering::SeqCst);
                warn!(
                    component = "transport",
                    event = "ws.disconnected",
                    reason = %reason,
                    "WebSocket connection lost"
                );
                sink.on_disconnect(&reason);
            }
            Err(e) => {
                warn!(
                    component = "transport",
                    event = "ws.connect_failed",
                    url = %transport.url,
                    error = %e,
                    "WebSocket connect failed"
                );
            }
        }

        attempts += 1;
        if attempts >= MAX_RECONNECT_ATTEMPTS {
            warn!(
                component = "transport",
                event = "ws.reconnect.gave_up",
                attempts = attempts,
                "Reconnect budget exhausted"
            );
            sink.on_reconnect_gave_up(attempts);
            break;
        }
        let delay = backoff_delay(attempts);
        debug!(
            component = "transport",
            event = "ws.reconnect.backoff",
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        tokio::time::sleep(delay).await;
    }

    // Hand the receiver back so a later connect() can resume sending.
    if let Ok(mut slot) = transport.outbound_rx.lock() {
        *slot = Some(outbound_rx);
    }
    transport.running.store(false, Ordering::SeqCst);
}

/// Drive one established connection until it closes or errors. Returns the
/// close reason.
async fn run_connection<S>(
    stream: WebSocketStream<S>,
    outbound_rx: &mut mpsc::Receiver<String>,
    sink: &dyn FrameSink,
) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_tx, mut ws_rx) = stream.split();
    let start = tokio::time::Instant::now() + HEARTBEAT_INTERVAL;
    let mut heartbeat = tokio::time::interval_at(start, HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if let Err(e) = ws_tx.send(Message::Text(HEARTBEAT_PING.into())).await {
                    return format!("heartbeat send failed: {e}");
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(text) => {
                        if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                            return format!("send failed: {e}");
                        }
                    }
                    None => return "outbound channel closed".to_string(),
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if text.as_str() == HEARTBEAT_PONG {
                            debug!(
                                component = "transport",
                                event = "ws.heartbeat.ack",
                                "Heartbeat acknowledged"
                            );
                        } else {
                            sink.on_frame(text.as_str());
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => return "server sent close frame".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return format!("read error: {e}"),
                    None => return "stream ended".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let schedule: Vec<u64> = (1..=9)
            .map(|attempt| backoff_delay(attempt).as_millis() as u64)
            .collect();
        assert_eq!(
            schedule,
            [500, 1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn backoff_never_overflows() {
        assert_eq!(backoff_delay(u32::MAX).as_millis() as u64, BACKOFF_CAP_MS);
        assert_eq!(backoff_delay(0).as_millis() as u64, BACKOFF_BASE_MS);
    }

    #[test]
    fn send_fails_while_disconnected() {
        let transport = Transport::new("ws://127.0.0.1:1/ws");
        let err = transport.send_text("{}".to_string()).unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }
}
