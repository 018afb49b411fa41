//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] carries [`TrackingEvent`]s from the tracking store to anyone
//! observing tracking state. It is shared via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shirizu_core::types::DbId;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// TrackingEvent
// ---------------------------------------------------------------------------

/// What changed in the tracking store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingEventKind {
    /// The tracked set was reconciled with history and favourites.
    TracksResolved,
    /// A check result was committed for one manga.
    UpdatesSaved,
    /// A cursor was moved to match reading progress.
    ReadingSynced,
    /// Unseen counters were reset.
    CountersCleared,
    /// A single cursor was deleted.
    TrackDeleted,
    /// Unreferenced tracks and old log entries were removed.
    GarbageCollected,
    /// The update log was emptied.
    LogsCleared,
}

/// A change to tracking state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub kind: TrackingEventKind,

    /// Affected manga. Empty for store-wide changes.
    pub manga_ids: Vec<DbId>,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl TrackingEvent {
    /// Create a store-wide event.
    pub fn new(kind: TrackingEventKind) -> Self {
        Self {
            kind,
            manga_ids: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach one affected manga.
    pub fn with_manga(mut self, manga_id: DbId) -> Self {
        self.manga_ids.push(manga_id);
        self
    }

    /// Attach several affected manga.
    pub fn with_mangas(mut self, manga_ids: impl IntoIterator<Item = DbId>) -> Self {
        self.manga_ids.extend(manga_ids);
        self
    }

    /// Whether the event may have changed the counter of `manga_id`.
    pub fn touches(&self, manga_id: DbId) -> bool {
        self.manga_ids.is_empty() || self.manga_ids.contains(&manga_id)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// ```rust
/// use shirizu_events::bus::{EventBus, TrackingEvent, TrackingEventKind};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(TrackingEvent::new(TrackingEventKind::LogsCleared));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<TrackingEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: TrackingEvent) {
        // A send error only means there are no receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
