//! Transport abstraction and the in-process loopback used by the host and
//! tests.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use formscout_core::Envelope;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// A peer the channel can talk to. Implementations perform one attempt per
/// call; timeouts, retries and queueing belong to [`Channel`](crate::Channel).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish (or re-establish) the link.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Deliver one envelope.
    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Liveness probe. `Ok` means the peer answered.
    async fn ping(&self) -> Result<(), TransportError>;
}

#[derive(Debug)]
struct LoopbackState {
    online: bool,
    invalidated: Option<String>,
    latency: Duration,
    ping_replies: bool,
    connect_attempts: u32,
}

/// In-process transport that forwards envelopes to an mpsc receiver.
///
/// Switches let callers simulate an offline peer, a silent peer (pings go
/// unanswered), slow delivery, and permanent invalidation.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl LoopbackTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            state: Arc::new(Mutex::new(LoopbackState {
                online: true,
                invalidated: None,
                latency: Duration::ZERO,
                ping_replies: true,
                connect_attempts: 0,
            })),
            tx,
        };
        (transport, rx)
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        // A poisoned flag set is still a usable flag set.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Stop answering pings while still accepting messages.
    pub fn set_ping_replies(&self, replies: bool) {
        self.lock().ping_replies = replies;
    }

    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Make every further call fail permanently.
    pub fn invalidate(&self, reason: impl Into<String>) {
        self.lock().invalidated = Some(reason.into());
    }

    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    fn check(&self) -> Result<Duration, TransportError> {
        let state = self.lock();
        if let Some(reason) = &state.invalidated {
            return Err(TransportError::Invalidated(reason.clone()));
        }
        if !state.online {
            return Err(TransportError::Unavailable("loopback peer offline".into()));
        }
        Ok(state.latency)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.lock().connect_attempts += 1;
        self.check().map(|_| ())
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let latency = self.check()?;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.tx
            .send(envelope.clone())
            .map_err(|_| TransportError::Unavailable("loopback receiver dropped".into()))
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.check()?;
        if self.lock().ping_replies {
            Ok(())
        } else {
            // A silent peer never answers; the caller's timeout decides.
            std::future::pending().await
        }
    }
}
