//! Telemetry fan-out bus.
//!
//! In-memory pub/sub with a bounded replay buffer: late subscribers receive
//! the most recent events in arrival order, and a slow or dropped observer
//! never blocks the publisher or the other subscribers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

/// Ring buffer capacity; oldest events are dropped first.
const BUFFER_CAPACITY: usize = 100;

/// Number of buffered events replayed to a new subscriber.
const REPLAY_COUNT: usize = 20;

/// Per-subscriber channel depth. A subscriber that falls this far behind is
/// dropped rather than allowed to stall publishing.
const CHANNEL_CAPACITY: usize = 256;

/// One event on the bus. Ephemeral; retained only in the replay ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub source: String,
    pub event_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

/// Identifier handed out by [`TelemetryBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(u64);

/// A live subscription: the id (for unsubscribe) and the event stream.
#[derive(Debug)]
pub struct TelemetrySubscription {
    pub id: SubscriberId,
    pub events: mpsc::Receiver<TelemetryEvent>,
}

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<TelemetryEvent>,
}

struct BusInner {
    subscribers: Vec<Subscriber>,
    buffer: VecDeque<TelemetryEvent>,
    next_id: u64,
}

/// Snapshot of bus activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub active_subscribers: usize,
    pub events_buffered: usize,
    pub buffer_capacity: usize,
}

/// Broadcast hub for every internal event in the governance core.
pub struct TelemetryBus {
    inner: RwLock<BusInner>,
}

impl TelemetryBus {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BusInner {
                subscribers: Vec::new(),
                buffer: VecDeque::with_capacity(BUFFER_CAPACITY),
                next_id: 0,
            }),
        }
    }

    /// Register a new observer. The most recent buffered events (up to 20)
    /// are replayed into its channel immediately, preserving arrival order.
    pub async fn subscribe(&self) -> TelemetrySubscription {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut inner = self.inner.write().await;

        let replay_start = inner.buffer.len().saturating_sub(REPLAY_COUNT);
        for event in inner.buffer.iter().skip(replay_start) {
            // Channel is fresh and larger than the replay window.
            let _ = tx.try_send(event.clone());
        }

        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push(Subscriber { id, tx });

        TelemetrySubscription { id, events: rx }
    }

    /// Remove an observer. Idempotent; unknown ids are ignored.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let mut inner = self.inner.write().await;
        inner.subscribers.retain(|s| s.id != id);
    }

    /// Wrap `data` into an event, buffer it, and deliver to every live
    /// subscriber. The event type is taken from `data["type"]` when present.
    /// Delivery is a bounded non-blocking attempt per subscriber; a full or
    /// closed channel removes only that subscriber.
    pub async fn publish(&self, source: &str, data: Value) {
        let event = TelemetryEvent {
            source: source.to_string(),
            event_type: data
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("info")
                .to_string(),
            data,
            timestamp: Utc::now(),
        };

        let mut inner = self.inner.write().await;

        if inner.buffer.len() == BUFFER_CAPACITY {
            inner.buffer.pop_front();
        }
        inner.buffer.push_back(event.clone());

        inner.subscribers.retain(|subscriber| {
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    tracing::debug!(subscriber = subscriber.id.0, "dropping telemetry subscriber");
                    false
                }
            }
        });
    }

    pub async fn stats(&self) -> TelemetryStats {
        let inner = self.inner.read().await;
        TelemetryStats {
            active_subscribers: inner.subscribers.len(),
            events_buffered: inner.buffer.len(),
            buffer_capacity: BUFFER_CAPACITY,
        }
    }
}

impl Default for TelemetryBus {
    fn default() -> Self {
        Self::new()
    }
}
