//! Bounded FIFO of envelopes waiting for a live connection.
//!
//! Every entry shares the queue's TTL, so expiry order equals insertion order
//! and expired entries are always at the head.

use std::collections::VecDeque;
use std::time::Duration;

use formscout_core::Envelope;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub envelope: Envelope,
    pub enqueued_at: Instant,
}

#[derive(Debug)]
pub struct MessageQueue {
    entries: VecDeque<QueuedMessage>,
    capacity: usize,
    ttl: Duration,
    expired: u64,
    overflowed: u64,
}

impl MessageQueue {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            ttl,
            expired: 0,
            overflowed: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages discarded because they outlived the TTL.
    pub fn expired_count(&self) -> u64 {
        self.expired
    }

    /// Messages discarded to make room for newer ones.
    pub fn overflow_count(&self) -> u64 {
        self.overflowed
    }

    /// Append an envelope, evicting the oldest entry when full.
    pub fn push(&mut self, envelope: Envelope, now: Instant) {
        self.purge_expired(now);
        if self.entries.len() >= self.capacity
            && let Some(evicted) = self.entries.pop_front()
        {
            self.overflowed += 1;
            warn!(
                sequence = evicted.envelope.sequence,
                action = evicted.envelope.message.action(),
                capacity = self.capacity,
                "message queue full, dropped oldest message"
            );
        }
        self.entries.push_back(QueuedMessage {
            envelope,
            enqueued_at: now,
        });
    }

    /// Drop every entry older than the TTL. Returns how many were dropped.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let mut dropped = 0;
        while let Some(front) = self.entries.front() {
            if now.saturating_duration_since(front.enqueued_at) <= self.ttl {
                break;
            }
            if let Some(stale) = self.entries.pop_front() {
                debug!(
                    sequence = stale.envelope.sequence,
                    action = stale.envelope.message.action(),
                    "queued message expired"
                );
            }
            dropped += 1;
        }
        if dropped > 0 {
            self.expired += dropped as u64;
            warn!(dropped, "expired queued messages");
        }
        dropped
    }

    /// Oldest live entry, after purging expired ones. The entry stays queued
    /// until [`pop_front`](Self::pop_front) confirms delivery.
    pub fn front_live(&mut self, now: Instant) -> Option<&QueuedMessage> {
        self.purge_expired(now);
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<QueuedMessage> {
        self.entries.pop_front()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop the head entry as expired, e.g. when its TTL ran out while a
    /// delivery was in flight.
    pub fn expire_front(&mut self) -> Option<QueuedMessage> {
        let stale = self.entries.pop_front()?;
        self.expired += 1;
        warn!(
            sequence = stale.envelope.sequence,
            action = stale.envelope.message.action(),
            "queued message expired during delivery"
        );
        Some(stale)
    }

    /// Discard everything without delivering.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.entries.iter()
    }
}
