//! Push notification channel
//!
//! A reconnect loop over an injected transport. Every received message is
//! appended to a bounded history and fanned out to live subscribers. After a
//! disconnect or failed connect the loop waits a fixed delay before trying
//! again, optionally giving up after a number of consecutive reconnects.

mod sse;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};

use crate::infra::ShutdownSignal;

pub use sse::{parse_sse_events, SseTransport};

const DEFAULT_RECONNECT_MS: u64 = 3_000;
const DEFAULT_HISTORY: usize = 50;

/// Notification channel errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification connect failed: {0}")]
    Connect(String),

    #[error("notification stream failed: {0}")]
    Stream(String),

    #[error("gave up after {0} consecutive reconnects")]
    ReconnectLimit(u32),
}

/// One received notification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Position in the order of receipt
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
    /// Message body; JSON when it parses, otherwise the raw text
    pub data: serde_json::Value,
}

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReconnectState {
    Connecting,
    Connected,
    Waiting { attempt: u32 },
    Stopped,
}

/// An open notification stream
#[async_trait]
pub trait NotificationConnection: Send {
    /// Next message; `None` once the peer closes the stream
    async fn next(&mut self) -> Result<Option<String>, NotificationError>;
}

/// Opens notification streams
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn NotificationConnection>, NotificationError>;
}

/// Delay capability
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Notification channel configuration
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Stream endpoint
    pub url: String,
    /// Fixed wait between reconnect attempts
    pub reconnect_delay: Duration,
    /// Number of notifications kept in history
    pub history_size: usize,
    /// Consecutive reconnects before giving up; unbounded when `None`
    pub max_reconnects: Option<u32>,
}

impl NotificationConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_MS),
            history_size: DEFAULT_HISTORY,
            max_reconnects: None,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("NOTIFICATIONS_URL").ok()?;
        let reconnect_ms = std::env::var("NOTIFICATIONS_RECONNECT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RECONNECT_MS);
        let history_size = std::env::var("NOTIFICATIONS_HISTORY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HISTORY);
        let max_reconnects = std::env::var("NOTIFICATIONS_MAX_RECONNECTS")
            .ok()
            .and_then(|s| s.parse().ok());

        Some(Self {
            url,
            reconnect_delay: Duration::from_millis(reconnect_ms),
            history_size,
            max_reconnects,
        })
    }
}

/// Bounded ring buffer of the most recent notifications
#[derive(Debug)]
pub struct NotificationHistory {
    capacity: usize,
    items: VecDeque<Notification>,
    next_sequence: u64,
}

impl NotificationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
            next_sequence: 0,
        }
    }

    /// Record a message, evicting the oldest one when full
    pub fn push(&mut self, raw: &str) -> Notification {
        let data = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        let notification = Notification {
            sequence: self.next_sequence,
            received_at: Utc::now(),
            data,
        };
        self.next_sequence += 1;

        if self.capacity > 0 {
            if self.items.len() == self.capacity {
                self.items.pop_front();
            }
            self.items.push_back(notification.clone());
        }
        notification
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<Notification> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Reconnecting notification listener
pub struct NotificationChannel {
    transport: Arc<dyn NotificationTransport>,
    sleeper: Arc<dyn Sleeper>,
    reconnect_delay: Duration,
    max_reconnects: Option<u32>,
    history: RwLock<NotificationHistory>,
    live: broadcast::Sender<Notification>,
    state: watch::Sender<ReconnectState>,
}

impl NotificationChannel {
    pub fn new(
        transport: Arc<dyn NotificationTransport>,
        sleeper: Arc<dyn Sleeper>,
        config: &NotificationConfig,
    ) -> Self {
        let (live, _) = broadcast::channel(config.history_size.max(16));
        let (state, _) = watch::channel(ReconnectState::Connecting);
        Self {
            transport,
            sleeper,
            reconnect_delay: config.reconnect_delay,
            max_reconnects: config.max_reconnects,
            history: RwLock::new(NotificationHistory::new(config.history_size)),
            live,
            state,
        }
    }

    /// Channel over server-sent events at `config.url`
    pub fn sse(config: &NotificationConfig) -> Self {
        Self::new(
            Arc::new(SseTransport::new(config.url.clone())),
            Arc::new(TokioSleeper),
            config,
        )
    }

    /// Live notifications received after subscribing
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.live.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<ReconnectState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ReconnectState {
        *self.state.borrow()
    }

    /// Buffered history, oldest first
    pub async fn history(&self) -> Vec<Notification> {
        self.history.read().await.snapshot()
    }

    fn set_state(&self, state: ReconnectState) {
        self.state.send_replace(state);
    }

    async fn record(&self, raw: &str) {
        let notification = self.history.write().await.push(raw);
        debug!(sequence = notification.sequence, "Notification received");
        // no live subscribers is fine
        let _ = self.live.send(notification);
    }

    /// Drain one connection until it closes, fails, or shutdown
    ///
    /// Returns true when shutdown was requested.
    async fn pump(
        &self,
        mut connection: Box<dyn NotificationConnection>,
        shutdown: &mut ShutdownSignal,
    ) -> bool {
        loop {
            tokio::select! {
                message = connection.next() => match message {
                    Ok(Some(raw)) => self.record(&raw).await,
                    Ok(None) => {
                        info!("Notification stream closed by peer");
                        return false;
                    }
                    Err(e) => {
                        warn!(error = %e, "Notification stream failed");
                        return false;
                    }
                },
                _ = shutdown.wait() => return true,
            }
        }
    }

    /// Run the reconnect loop until shutdown or the reconnect limit
    pub async fn run(&self, mut shutdown: ShutdownSignal) -> Result<(), NotificationError> {
        let mut attempt: u32 = 0;

        while !shutdown.is_shutdown() {
            self.set_state(ReconnectState::Connecting);

            let connected = tokio::select! {
                result = self.transport.connect() => result,
                _ = shutdown.wait() => break,
            };

            match connected {
                Ok(connection) => {
                    info!("Notification stream connected");
                    self.set_state(ReconnectState::Connected);
                    attempt = 0;
                    if self.pump(connection, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Notification connect failed"),
            }

            attempt += 1;
            if let Some(max) = self.max_reconnects {
                if attempt > max {
                    warn!(max, "Notification reconnect limit reached");
                    self.set_state(ReconnectState::Stopped);
                    return Err(NotificationError::ReconnectLimit(max));
                }
            }

            self.set_state(ReconnectState::Waiting { attempt });
            debug!(attempt, delay_ms = self.reconnect_delay.as_millis() as u64, "Reconnecting");
            tokio::select! {
                _ = self.sleeper.sleep(self.reconnect_delay) => {}
                _ = shutdown.wait() => break,
            }
        }

        self.set_state(ReconnectState::Stopped);
        Ok(())
    }

    /// Run the loop on a background task
    pub fn spawn(
        self: &Arc<Self>,
        shutdown: ShutdownSignal,
    ) -> tokio::task::JoinHandle<Result<(), NotificationError>> {
        let channel = Arc::clone(self);
        tokio::spawn(async move { channel.run(shutdown).await })
    }
}
