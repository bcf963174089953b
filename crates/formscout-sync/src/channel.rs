//! Connection state machine for one page instance.
//!
//! `Disconnected → Connecting → Connected`, with `Failed` after the retry
//! budget is spent or the transport reports a permanent failure. While not
//! connected, sends are queued; on every transition to `Connected` the live
//! queue is flushed in order before anything new goes out.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use formscout_core::{CachedResult, ChannelConfig, Envelope, Message, PageInstanceId};
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};

use crate::cache::ResultCache;
use crate::error::{ChannelError, TransportError};
use crate::queue::MessageQueue;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive failed connection attempts.
    pub retry_count: u32,
    pub last_error: Option<TransportError>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_count: 0,
            last_error: None,
        }
    }
}

/// Outcome of [`Channel::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Queued,
}

pub struct Channel {
    page: PageInstanceId,
    transport: Arc<dyn Transport>,
    config: ChannelConfig,
    status: ConnectionStatus,
    queue: MessageQueue,
    cache: ResultCache,
    sequence: u64,
    missed_pings: u32,
    next_retry_at: Option<Instant>,
    invalidated: Option<String>,
}

impl Channel {
    pub fn new(page: PageInstanceId, transport: Arc<dyn Transport>, config: ChannelConfig) -> Self {
        Self {
            page,
            transport,
            queue: MessageQueue::new(config.queue_capacity, config.queue_ttl()),
            cache: ResultCache::new(config.cache_ttl()),
            config,
            status: ConnectionStatus::default(),
            sequence: 0,
            missed_pings: 0,
            next_retry_at: None,
            invalidated: None,
        }
    }

    pub fn page(&self) -> PageInstanceId {
        self.page
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// When the next automatic connection attempt is due, if one is scheduled.
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.next_retry_at
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.is_some()
    }

    /// Last delivered result, flagged stale past the cache TTL. Readable in
    /// any connection state.
    pub fn cached_result(&self) -> Option<CachedResult> {
        self.cache.get(Instant::now())
    }

    /// One connection attempt. Transient failures schedule the next attempt
    /// with backoff; permanent ones fail the channel and return an error.
    pub async fn connect(&mut self) -> Result<ConnectionState, ChannelError> {
        self.check_invalidated()?;
        match self.status.state {
            ConnectionState::Connected | ConnectionState::Failed => return Ok(self.status.state),
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
        }

        self.next_retry_at = None;
        self.set_state(ConnectionState::Connecting);
        let attempt = timeout(self.config.connect_timeout(), self.transport.connect())
            .await
            .unwrap_or(Err(TransportError::Timeout));

        match attempt {
            Ok(()) => {
                self.status.retry_count = 0;
                self.status.last_error = None;
                self.missed_pings = 0;
                self.set_state(ConnectionState::Connected);
                self.flush().await?;
            }
            Err(err) if err.is_permanent() => return Err(self.invalidate(err)),
            Err(err) => self.on_connect_failure(err),
        }
        Ok(self.status.state)
    }

    /// Keep attempting until connected or failed, sleeping out each backoff.
    pub async fn connect_with_retry(&mut self) -> Result<ConnectionState, ChannelError> {
        loop {
            let state = self.connect().await?;
            match (state, self.next_retry_at) {
                (ConnectionState::Disconnected, Some(at)) => tokio::time::sleep_until(at).await,
                _ => return Ok(state),
            }
        }
    }

    /// Leave `Failed` after an explicit external trigger. The next attempt
    /// is due immediately.
    pub fn reset(&mut self) {
        if self.status.state != ConnectionState::Failed {
            return;
        }
        info!(page = %self.page, "channel reset");
        self.invalidated = None;
        self.status.retry_count = 0;
        self.status.last_error = None;
        self.next_retry_at = Some(Instant::now());
        self.set_state(ConnectionState::Disconnected);
    }

    /// Send a message, or queue it when there is no live connection.
    pub async fn send(&mut self, message: Message) -> Result<Delivery, ChannelError> {
        self.check_invalidated()?;
        let envelope = self.envelope(message);

        if self.status.state == ConnectionState::Connected {
            self.flush().await?;
        }
        if self.status.state != ConnectionState::Connected || !self.queue.is_empty() {
            debug!(
                page = %self.page,
                sequence = envelope.sequence,
                action = envelope.message.action(),
                state = %self.status.state,
                "queueing message"
            );
            self.queue.push(envelope, Instant::now());
            return Ok(Delivery::Queued);
        }

        let started = Instant::now();
        match self.deliver(&envelope, self.config.send_timeout()).await {
            Ok(()) => Ok(Delivery::Sent),
            Err(err) => {
                self.on_send_failure(err)?;
                // Its lifetime counts from the first attempt.
                self.queue.push(envelope, started);
                Ok(Delivery::Queued)
            }
        }
    }

    /// One liveness probe. Enough consecutive misses drop the connection.
    pub async fn health_check(&mut self) -> Result<ConnectionState, ChannelError> {
        self.check_invalidated()?;
        if self.status.state != ConnectionState::Connected {
            return Ok(self.status.state);
        }

        let probe = timeout(self.config.ping_timeout(), self.transport.ping())
            .await
            .unwrap_or(Err(TransportError::Timeout));
        match probe {
            Ok(()) => self.missed_pings = 0,
            Err(err) if err.is_permanent() => return Err(self.invalidate(err)),
            Err(err) => {
                self.missed_pings += 1;
                debug!(page = %self.page, missed = self.missed_pings, error = %err, "ping missed");
                if self.missed_pings >= self.config.missed_ping_limit {
                    warn!(page = %self.page, missed = self.missed_pings, "peer stopped answering pings");
                    self.mark_disconnected(err);
                }
            }
        }
        Ok(self.status.state)
    }

    /// Drop queued messages without delivering them. Returns how many.
    pub fn clear_queue(&mut self) -> usize {
        let dropped = self.queue.clear();
        if dropped > 0 {
            info!(page = %self.page, dropped, "discarded queued messages");
        }
        dropped
    }

    /// Release everything held for this page instance.
    pub fn teardown(&mut self) {
        let dropped = self.queue.clear();
        self.cache.clear();
        self.next_retry_at = None;
        self.missed_pings = 0;
        self.set_state(ConnectionState::Disconnected);
        debug!(page = %self.page, dropped, "channel torn down");
    }

    fn envelope(&mut self, message: Message) -> Envelope {
        self.sequence += 1;
        Envelope {
            page_instance_id: self.page,
            sequence: self.sequence,
            message,
        }
    }

    async fn flush(&mut self) -> Result<usize, ChannelError> {
        let mut delivered = 0;
        while self.status.state == ConnectionState::Connected {
            let now = Instant::now();
            let Some(front) = self.queue.front_live(now) else {
                break;
            };
            let (envelope, enqueued_at) = (front.envelope.clone(), front.enqueued_at);
            let expires_at = enqueued_at + self.queue.ttl();

            // A queued message may not arrive after its TTL, so the send
            // window shrinks to whatever lifetime it has left.
            let send_timeout = self.config.send_timeout();
            let budget = send_timeout.min(expires_at.saturating_duration_since(now));
            match self.deliver(&envelope, budget).await {
                Ok(()) => {
                    // Only popped once delivered, so a retry never skips or repeats.
                    self.queue.pop_front();
                    delivered += 1;
                }
                Err(TransportError::Timeout) if Instant::now() >= expires_at => {
                    self.queue.expire_front();
                }
                Err(err) => {
                    self.on_send_failure(err)?;
                    break;
                }
            }
        }
        if delivered > 0 {
            info!(page = %self.page, delivered, remaining = self.queue.len(), "flushed queued messages");
        }
        Ok(delivered)
    }

    async fn deliver(&mut self, envelope: &Envelope, within: Duration) -> Result<(), TransportError> {
        timeout(within, self.transport.send(envelope))
            .await
            .unwrap_or(Err(TransportError::Timeout))?;

        if let Message::DetectionComplete { result } = &envelope.message {
            self.cache.store(result.clone(), Instant::now(), Utc::now());
        }
        Ok(())
    }

    fn on_send_failure(&mut self, err: TransportError) -> Result<(), ChannelError> {
        if err.is_permanent() {
            return Err(self.invalidate(err));
        }
        warn!(page = %self.page, error = %err, "send failed");
        self.mark_disconnected(err);
        Ok(())
    }

    fn on_connect_failure(&mut self, err: TransportError) {
        self.status.retry_count += 1;
        let attempts = self.status.retry_count;
        let policy = &self.config.retry;

        if attempts >= policy.max_attempts {
            warn!(page = %self.page, attempts, error = %err, "reconnection attempts exhausted");
            self.status.last_error = Some(err);
            self.set_state(ConnectionState::Failed);
            return;
        }

        let delay = policy.delay_for_attempt(attempts - 1);
        debug!(page = %self.page, attempts, delay_ms = delay.as_millis() as u64, error = %err, "connection attempt failed");
        self.status.last_error = Some(err);
        self.next_retry_at = Some(Instant::now() + delay);
        self.set_state(ConnectionState::Disconnected);
    }

    fn mark_disconnected(&mut self, err: TransportError) {
        self.status.last_error = Some(err);
        self.missed_pings = 0;
        self.next_retry_at =
            Some(Instant::now() + self.config.retry.delay_for_attempt(self.status.retry_count));
        self.set_state(ConnectionState::Disconnected);
    }

    fn invalidate(&mut self, err: TransportError) -> ChannelError {
        let reason = err.to_string();
        error!(page = %self.page, error = %err, "transport permanently unavailable");
        let dropped = self.queue.clear();
        if dropped > 0 {
            warn!(page = %self.page, dropped, "discarded queued messages");
        }
        self.next_retry_at = None;
        self.status.last_error = Some(err);
        self.invalidated = Some(reason.clone());
        self.set_state(ConnectionState::Failed);
        ChannelError::Invalidated(reason)
    }

    fn check_invalidated(&self) -> Result<(), ChannelError> {
        match &self.invalidated {
            Some(reason) => Err(ChannelError::Invalidated(reason.clone())),
            None => Ok(()),
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        let from = self.status.state;
        if from == state {
            return;
        }
        self.status.state = state;
        match state {
            ConnectionState::Connected | ConnectionState::Failed => {
                info!(page = %self.page, %from, to = %state, "connection state changed")
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                debug!(page = %self.page, %from, to = %state, "connection state changed")
            }
        }
    }
}
