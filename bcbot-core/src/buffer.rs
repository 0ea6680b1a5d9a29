// ABOUTME: Bounded FIFO buffer of inbound events with monotonic sequence numbers.
// ABOUTME: Oldest events are evicted silently once capacity is reached.

use bcbot_client::{EventKind, InboundEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::error::{BotError, BotResult};

pub const DEFAULT_EVENT_CAPACITY: usize = 500;

/// An event as retained by the buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub payload: Value,
}

/// Thread-safe ring buffer of the most recent events.
///
/// Sequence numbers start at 1 and keep increasing across `clear`, so a
/// caller paging with `since` never sees a number reused.
pub struct EventBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    events: VecDeque<Event>,
    next_sequence: u64,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::with_capacity(capacity),
                next_sequence: 1,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the newest retained event
    pub fn latest_sequence(&self) -> Option<u64> {
        self.lock().events.back().map(|e| e.sequence)
    }

    /// Append an event, evicting the oldest one when full. Returns the assigned sequence.
    pub fn ingest(&self, event: InboundEvent) -> u64 {
        let mut inner = self.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        if inner.events.len() >= self.capacity {
            inner.events.pop_front();
        }
        inner.events.push_back(Event {
            sequence,
            timestamp: Utc::now(),
            kind: event.kind,
            payload: event.payload,
        });
        sequence
    }

    /// Read retained events in ascending sequence order.
    ///
    /// Without `since`, returns the most recent `limit` events. With `since`,
    /// returns the first `limit` events whose sequence is greater than `since`.
    /// `limit` must lie within `1..=capacity`.
    pub fn query(&self, since: Option<u64>, limit: Option<usize>) -> BotResult<Vec<Event>> {
        if let Some(limit) = limit {
            if limit == 0 || limit > self.capacity {
                return Err(BotError::invalid(format!(
                    "limit must be between 1 and {}, got {}",
                    self.capacity, limit
                )));
            }
        }

        let inner = self.lock();
        let events = match since {
            Some(since) => {
                let start = inner.events.partition_point(|e| e.sequence <= since);
                let take = limit.unwrap_or(self.capacity);
                inner.events.range(start..).take(take).cloned().collect()
            }
            None => {
                let take = limit.unwrap_or(self.capacity).min(inner.events.len());
                let start = inner.events.len() - take;
                inner.events.range(start..).cloned().collect()
            }
        };
        Ok(events)
    }

    /// Drop all retained events. Sequence numbering continues.
    pub fn clear(&self) {
        self.lock().events.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
