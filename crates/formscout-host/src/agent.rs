//! The page agent: one task that owns the current page instance and drives
//! detection, publication and the messaging channel from a single
//! `tokio::select!` loop.
//!
//! Nothing here runs in parallel. Triggers, inbound messages and timers are
//! handled one at a time, so the per-instance record needs no locking.

use std::sync::Arc;
use std::time::Duration;

use formscout_core::{AppConfig, DetectionErrorReport, Message, PageInstanceId, ProgressPhase};
use formscout_detect::Engine;
use formscout_sync::{ChannelError, ConnectionStatus, Delivery, Transport};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::orchestrator::{AttemptOutcome, CandidateOutcome};
use crate::source::PageSource;
use crate::store::{InstanceStore, PageContext};

const EVENT_BUFFER: usize = 64;

#[derive(Debug)]
pub enum AgentEvent {
    /// Page load or a burst of DOM mutations.
    PageChanged,
    /// The page is navigating away; the current instance ends.
    Navigate,
    /// Explicit request to bring a failed channel back.
    Reconnect,
    /// A message from a consumer, optionally expecting a direct reply.
    Inbound {
        message: Message,
        reply: Option<oneshot::Sender<Message>>,
    },
}

/// What the agent looks like from outside: the current page instance, its
/// connection and the last fatal report raised for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    pub page: PageInstanceId,
    pub connection: ConnectionStatus,
    /// Messages waiting for the connection to come back.
    pub queued: usize,
    pub fatal: Option<DetectionErrorReport>,
}

impl AgentStatus {
    fn of(ctx: &PageContext) -> Self {
        Self {
            page: ctx.page,
            connection: ctx.channel.status().clone(),
            queued: ctx.channel.queue_len(),
            fatal: ctx.reporter.last_fatal().cloned(),
        }
    }
}

/// Cloneable handle for feeding events to a running [`PageAgent`].
#[derive(Debug, Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<AgentEvent>,
    status: watch::Receiver<AgentStatus>,
    shutdown: CancellationToken,
}

impl AgentHandle {
    async fn push(&self, event: AgentEvent) -> Result<(), AgentError> {
        self.tx.send(event).await.map_err(|_| AgentError::Stopped)
    }

    pub async fn page_changed(&self) -> Result<(), AgentError> {
        self.push(AgentEvent::PageChanged).await
    }

    pub async fn navigate(&self) -> Result<(), AgentError> {
        self.push(AgentEvent::Navigate).await
    }

    pub async fn reconnect(&self) -> Result<(), AgentError> {
        self.push(AgentEvent::Reconnect).await
    }

    /// Deliver a consumer message; any reply goes out over the channel.
    pub async fn notify(&self, message: Message) -> Result<(), AgentError> {
        self.push(AgentEvent::Inbound {
            message,
            reply: None,
        })
        .await
    }

    /// Deliver a consumer message and wait for the direct reply.
    pub async fn request(&self, message: Message, wait: Duration) -> Result<Message, AgentError> {
        let (reply, rx) = oneshot::channel();
        self.push(AgentEvent::Inbound {
            message,
            reply: Some(reply),
        })
        .await?;
        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(AgentError::NoReply),
            Err(_) => Err(AgentError::Timeout(wait)),
        }
    }

    /// Latest published status. Still readable after the agent stops.
    pub fn status(&self) -> AgentStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes, e.g. connection state transitions or a
    /// fatal failure that cannot be delivered over the channel.
    pub fn watch_status(&self) -> watch::Receiver<AgentStatus> {
        self.status.clone()
    }

    /// Stop the agent, aborting whatever it is waiting on.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

pub struct PageAgent {
    engine: Arc<Engine>,
    source: Arc<dyn PageSource>,
    transport: Arc<dyn Transport>,
    store: InstanceStore,
    current: PageInstanceId,
    events: mpsc::Receiver<AgentEvent>,
    status: watch::Sender<AgentStatus>,
    shutdown: CancellationToken,
}

impl PageAgent {
    /// Create an agent with its first page instance registered.
    pub fn new(
        engine: Arc<Engine>,
        source: Arc<dyn PageSource>,
        transport: Arc<dyn Transport>,
        config: AppConfig,
    ) -> (Self, AgentHandle) {
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let shutdown = CancellationToken::new();
        let mut store = InstanceStore::with_token(config, shutdown.clone());
        let current = store.register(transport.clone());
        let (status_tx, status) = watch::channel(AgentStatus {
            page: current,
            connection: ConnectionStatus::default(),
            queued: 0,
            fatal: None,
        });
        let agent = Self {
            engine,
            source,
            transport,
            store,
            current,
            events,
            status: status_tx,
            shutdown: shutdown.clone(),
        };
        (
            agent,
            AgentHandle {
                tx,
                status,
                shutdown,
            },
        )
    }

    pub fn current_page(&self) -> PageInstanceId {
        self.current
    }

    /// Run until shut down or every handle is dropped. The current page
    /// instance is torn down on the way out.
    pub async fn run(mut self) {
        let period = self.store.config().channel.ping_interval();
        let mut health = tokio::time::interval_at(Instant::now() + period, period);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(page = %self.current, "page agent started");
        self.connect().await;
        self.start_detection().await;

        loop {
            self.publish_status();
            let (settle_at, detect_retry_at, reconnect_at) = match self.store.get(self.current) {
                Some(ctx) => (
                    ctx.orchestrator.settle_deadline(),
                    ctx.orchestrator.retry_deadline(),
                    ctx.channel.next_retry_at(),
                ),
                None => (None, None, None),
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                _ = until(settle_at) => self.publish_due().await,
                _ = until(detect_retry_at) => self.attempt_detection().await,
                _ = until(reconnect_at) => self.connect().await,
                _ = health.tick() => self.health_check().await,
            }
        }

        self.publish_status();
        self.store.remove(self.current);
        info!(page = %self.current, "page agent stopped");
    }

    fn publish_status(&self) {
        let Some(ctx) = self.store.get(self.current) else {
            return;
        };
        let next = AgentStatus::of(ctx);
        self.status.send_if_modified(|status| {
            if *status == next {
                return false;
            }
            *status = next;
            true
        });
    }

    async fn handle(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::PageChanged => self.start_detection().await,
            AgentEvent::Navigate => self.navigate().await,
            AgentEvent::Reconnect => {
                if let Some(ctx) = self.store.get_mut(self.current) {
                    ctx.channel.reset();
                }
                self.connect().await;
            }
            AgentEvent::Inbound { message, reply } => self.dispatch(message, reply).await,
        }
    }

    async fn dispatch(&mut self, message: Message, reply: Option<oneshot::Sender<Message>>) {
        let response = match message {
            Message::Ping { timestamp } => Some(Message::Pong { timestamp }),
            Message::GetDetectionResult { page_instance_id } => {
                let cached = self
                    .store
                    .get(page_instance_id)
                    .and_then(|ctx| ctx.channel.cached_result());
                Some(Message::CachedResult { cached })
            }
            Message::TriggerDetection => {
                self.start_detection().await;
                None
            }
            Message::Pong { .. }
            | Message::NavigationIntent { .. }
            | Message::ProgressiveUpdate { .. }
            | Message::DetectionComplete { .. }
            | Message::DetectionError(_)
            | Message::CachedResult { .. } => {
                warn!(action = message.action(), "ignoring consumer-bound message sent to agent");
                None
            }
        };

        let Some(response) = response else {
            return;
        };
        match reply {
            Some(reply) => {
                if reply.send(response).is_err() {
                    debug!("requester went away before reply");
                }
            }
            None => self.send(response).await,
        }
    }

    async fn start_detection(&mut self) {
        let Some(ctx) = self.store.get_mut(self.current) else {
            return;
        };
        let generation = ctx.orchestrator.begin();
        debug!(page = %ctx.page, generation, "detection cycle started");
        self.attempt_detection().await;
    }

    async fn attempt_detection(&mut self) {
        let progressive = self.store.config().detection.progressive_updates;
        let Some(ctx) = self.store.get_mut(self.current) else {
            return;
        };
        let attempt = ctx.orchestrator.start_attempt();
        let token = ctx.cancellation();
        let snapshot = tokio::select! {
            _ = token.cancelled() => return,
            snapshot = self.source.snapshot() => snapshot,
        };

        let preview = match snapshot {
            Ok(snapshot) => {
                let result = self
                    .engine
                    .detect(&snapshot, ctx.page, ctx.orchestrator.generation());
                let partial = progressive.then(|| result.clone());
                match (ctx.orchestrator.candidate(result, Instant::now()), partial) {
                    (CandidateOutcome::Held, Some(partial)) => {
                        Some((ProgressPhase::Detecting, partial))
                    }
                    (CandidateOutcome::Replaced, Some(partial)) => {
                        Some((ProgressPhase::Stabilizing, partial))
                    }
                    _ => None,
                }
            }
            Err(err) => match ctx.orchestrator.attempt_failed(Instant::now()) {
                AttemptOutcome::RetryAt(_) => {
                    debug!(page = %ctx.page, attempt, error = %err, "snapshot failed, will retry");
                    None
                }
                AttemptOutcome::Exhausted { attempts } => {
                    let report = ctx.reporter.report(
                        format!("detection failed after {attempts} attempts: {err}"),
                        "snapshot",
                        true,
                    );
                    if let Some(report) = report {
                        self.send(Message::DetectionError(report)).await;
                    }
                    None
                }
            },
        };

        if let Some((phase, partial)) = preview {
            self.send(Message::ProgressiveUpdate { phase, partial }).await;
        }
    }

    async fn publish_due(&mut self) {
        let Some(ctx) = self.store.get_mut(self.current) else {
            return;
        };
        let Some(result) = ctx.orchestrator.fire(Instant::now()) else {
            return;
        };
        info!(
            page = %ctx.page,
            generation = result.generation,
            jurisdiction = %result.jurisdiction.code,
            confidence = result.confidence,
            fields = result.field_count,
            registration_form = result.is_registration_form,
            "publishing detection result"
        );
        self.send(Message::DetectionComplete { result }).await;
    }

    async fn navigate(&mut self) {
        let old = self.current;
        if let Some(ctx) = self.store.get_mut(old) {
            let discarded = ctx.orchestrator.cancel();
            // Anything addressed to the old instance is meaningless now.
            let dropped = ctx.channel.clear_queue();
            info!(page = %old, discarded_candidate = discarded, dropped, "navigation");
        }
        self.send(Message::NavigationIntent {
            page_instance_id: old,
        })
        .await;

        self.store.remove(old);
        self.current = self.store.register(self.transport.clone());
        self.connect().await;
    }

    async fn send(&mut self, message: Message) {
        let Some(ctx) = self.store.get_mut(self.current) else {
            return;
        };
        let token = ctx.cancellation();
        let action = message.action();
        let outcome = tokio::select! {
            _ = token.cancelled() => return,
            outcome = ctx.channel.send(message) => outcome,
        };
        match outcome {
            Ok(Delivery::Sent) => debug!(page = %ctx.page, action, "message sent"),
            Ok(Delivery::Queued) => debug!(page = %ctx.page, action, state = %ctx.channel.state(), "message queued"),
            Err(err) => channel_failed(ctx, err),
        }
    }

    async fn connect(&mut self) {
        let Some(ctx) = self.store.get_mut(self.current) else {
            return;
        };
        let token = ctx.cancellation();
        let outcome = tokio::select! {
            _ = token.cancelled() => return,
            outcome = ctx.channel.connect() => outcome,
        };
        if let Err(err) = outcome {
            channel_failed(ctx, err);
        }
    }

    async fn health_check(&mut self) {
        let Some(ctx) = self.store.get_mut(self.current) else {
            return;
        };
        let token = ctx.cancellation();
        let outcome = tokio::select! {
            _ = token.cancelled() => return,
            outcome = ctx.channel.health_check() => outcome,
        };
        if let Err(err) = outcome {
            channel_failed(ctx, err);
        }
    }
}

/// The consumer is unreachable for good, so the report cannot go over the
/// channel; it surfaces through [`AgentHandle::status`] instead.
fn channel_failed(ctx: &mut PageContext, err: ChannelError) {
    ctx.reporter.report(err.to_string(), "channel", true);
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formscout_core::{
        DetectionResult, Element, Envelope, InputAttrs, InputKind, PageSnapshot, Style,
    };
    use formscout_sync::{ConnectionState, LoopbackTransport, TransportError};
    use tokio::task::JoinHandle;

    use crate::source::MemorySource;

    const LABELS: [&str; 3] = ["Business Name", "Employer Identification Number", "Email"];

    fn dc_page(fields: usize) -> PageSnapshot {
        let mut elements = vec![Element {
            tag: "h2".into(),
            text: "Business Information".into(),
            top_px: 0.0,
            style: Style::default(),
            input: None,
        }];
        for (i, label) in LABELS.iter().take(fields).enumerate() {
            elements.push(Element {
                tag: "input".into(),
                text: String::new(),
                top_px: 40.0 * (i + 1) as f32,
                style: Style::default(),
                input: Some(InputAttrs {
                    kind: InputKind::Text,
                    label: (*label).into(),
                    ..Default::default()
                }),
            });
        }
        PageSnapshot::new("https://mytax.dc.gov/_/#2", elements)
    }

    struct Harness {
        handle: AgentHandle,
        transport: LoopbackTransport,
        rx: mpsc::UnboundedReceiver<Envelope>,
        source: Arc<MemorySource>,
        task: JoinHandle<()>,
    }

    impl Harness {
        fn drain(&mut self) -> Vec<Envelope> {
            let mut out = Vec::new();
            while let Ok(env) = self.rx.try_recv() {
                out.push(env);
            }
            out
        }
    }

    fn start(source: MemorySource, config: AppConfig, online: bool) -> Harness {
        let engine = Arc::new(Engine::new(config.detection.clone()).unwrap());
        let source = Arc::new(source);
        let (transport, rx) = LoopbackTransport::new();
        transport.set_online(online);
        let (agent, handle) = PageAgent::new(
            engine,
            source.clone(),
            Arc::new(transport.clone()),
            config,
        );
        let task = tokio::spawn(agent.run());
        Harness {
            handle,
            transport,
            rx,
            source,
            task,
        }
    }

    fn completes(envs: &[Envelope]) -> Vec<&DetectionResult> {
        envs.iter()
            .filter_map(|e| match &e.message {
                Message::DetectionComplete { result } => Some(result),
                _ => None,
            })
            .collect()
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_final_pass_in_a_settle_window_is_published() {
        let mut h = start(MemorySource::new(dc_page(2)), AppConfig::default(), true);
        sleep_ms(500).await;
        h.source.set(dc_page(3));
        h.handle.page_changed().await.unwrap();
        sleep_ms(1200).await;
        assert!(completes(&h.drain()).is_empty());

        sleep_ms(2000).await;
        let envs = h.drain();
        let published = completes(&envs);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].field_count, 3);
        assert_eq!(published[0].generation, 2);
        assert_eq!(published[0].jurisdiction.code, "DC");
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_discards_pending_result() {
        let mut h = start(MemorySource::new(dc_page(3)), AppConfig::default(), true);
        sleep_ms(500).await;
        h.handle.navigate().await.unwrap();
        sleep_ms(3000).await;

        let envs = h.drain();
        assert!(completes(&envs).is_empty());
        assert!(envs.iter().any(|e| e.message
            == Message::NavigationIntent {
                page_instance_id: PageInstanceId(1)
            }));
    }

    #[tokio::test(start_paused = true)]
    async fn new_instance_after_navigation_detects_independently() {
        let mut h = start(MemorySource::new(dc_page(3)), AppConfig::default(), true);
        sleep_ms(2000).await;
        h.handle.navigate().await.unwrap();
        h.handle.page_changed().await.unwrap();
        sleep_ms(2000).await;

        let envs = h.drain();
        let published = completes(&envs);
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].page_instance_id, PageInstanceId(1));
        assert_eq!(published[1].page_instance_id, PageInstanceId(2));
        assert_eq!(published[1].generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_drops_messages_queued_for_the_old_instance() {
        let mut h = start(MemorySource::new(dc_page(3)), AppConfig::default(), false);
        sleep_ms(2000).await;
        let before = h.handle.status();
        assert_eq!(before.page, PageInstanceId(1));
        assert_eq!(before.connection.state, ConnectionState::Disconnected);
        assert_eq!(before.queued, 1);

        h.handle.navigate().await.unwrap();
        sleep_ms(100).await;
        h.transport.set_online(true);
        h.handle.reconnect().await.unwrap();
        sleep_ms(100).await;

        let after = h.handle.status();
        assert_eq!(after.page, PageInstanceId(2));
        assert_eq!(after.connection.state, ConnectionState::Connected);
        assert_eq!(after.queued, 0);

        h.handle.page_changed().await.unwrap();
        sleep_ms(2000).await;
        let envs = h.drain();
        assert!(envs.iter().all(|e| e.page_instance_id == PageInstanceId(2)));
        let published = completes(&envs);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].page_instance_id, PageInstanceId(2));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidated_transport_is_reported_as_fatal() {
        let h = start(MemorySource::new(dc_page(3)), AppConfig::default(), true);
        sleep_ms(2000).await;
        let healthy = h.handle.status();
        assert_eq!(healthy.connection.state, ConnectionState::Connected);
        assert!(healthy.fatal.is_none());

        let mut status = h.handle.watch_status();
        h.transport.invalidate("extension context invalidated");
        h.handle.page_changed().await.unwrap();

        let failed = status.wait_for(|s| s.fatal.is_some()).await.unwrap().clone();
        assert_eq!(failed.connection.state, ConnectionState::Failed);
        assert!(matches!(
            failed.connection.last_error,
            Some(TransportError::Invalidated(_))
        ));
        let fatal = failed.fatal.unwrap();
        assert!(fatal.is_fatal);
        assert_eq!(fatal.context, "channel");
        assert!(fatal.message.contains("extension context invalidated"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_outage_shows_as_connection_state() {
        let h = start(MemorySource::new(dc_page(3)), AppConfig::default(), true);
        sleep_ms(2000).await;
        h.transport.set_ping_replies(false);

        let mut status = h.handle.watch_status();
        let dropped = status
            .wait_for(|s| s.connection.state == ConnectionState::Disconnected)
            .await
            .unwrap()
            .clone();
        assert!(dropped.fatal.is_none());
        assert_eq!(dropped.connection.last_error, Some(TransportError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn detection_exhaustion_is_fatal_and_capped() {
        let mut h = start(MemorySource::empty(), AppConfig::default(), true);
        sleep_ms(1000).await;
        for _ in 0..4 {
            h.handle.page_changed().await.unwrap();
            sleep_ms(1000).await;
        }

        let envs = h.drain();
        let errors: Vec<_> = envs
            .iter()
            .filter_map(|e| match &e.message {
                Message::DetectionError(report) => Some(report),
                _ => None,
            })
            .collect();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|r| r.is_fatal));
        assert!(completes(&envs).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_snapshot_failure_is_retried() {
        let source = MemorySource::new(dc_page(3));
        source.fail_next(2);
        let mut h = start(source, AppConfig::default(), true);
        sleep_ms(3000).await;

        let envs = h.drain();
        assert_eq!(completes(&envs).len(), 1);
        assert!(!envs
            .iter()
            .any(|e| matches!(e.message, Message::DetectionError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cached_result_is_served_while_disconnected() {
        let h = start(MemorySource::new(dc_page(3)), AppConfig::default(), true);
        sleep_ms(2000).await;
        h.transport.set_online(false);

        let ask = || Message::GetDetectionResult {
            page_instance_id: PageInstanceId(1),
        };
        let wait = Duration::from_secs(1);

        let Message::CachedResult { cached: Some(fresh) } =
            h.handle.request(ask(), wait).await.unwrap()
        else {
            panic!("expected a cached result");
        };
        assert!(!fresh.stale);
        assert_eq!(fresh.result.generation, 1);

        sleep_ms(301_000).await;
        let Message::CachedResult { cached: Some(stale) } =
            h.handle.request(ask(), wait).await.unwrap()
        else {
            panic!("expected a cached result");
        };
        assert!(stale.stale);
        assert_eq!(stale.result.field_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_page_has_no_cached_result() {
        let h = start(MemorySource::new(dc_page(3)), AppConfig::default(), true);
        let reply = h
            .handle
            .request(
                Message::GetDetectionResult {
                    page_instance_id: PageInstanceId(99),
                },
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(reply, Message::CachedResult { cached: None });
    }

    #[tokio::test(start_paused = true)]
    async fn ping_is_answered() {
        let h = start(MemorySource::new(dc_page(3)), AppConfig::default(), true);
        let reply = h
            .handle
            .request(Message::Ping { timestamp: 42 }, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply, Message::Pong { timestamp: 42 });
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_detection_starts_a_new_cycle() {
        let mut h = start(MemorySource::new(dc_page(3)), AppConfig::default(), true);
        sleep_ms(2000).await;
        h.source.set(dc_page(2));
        h.handle.notify(Message::TriggerDetection).await.unwrap();
        sleep_ms(2000).await;

        let envs = h.drain();
        let generations: Vec<u64> = completes(&envs).iter().map(|r| r.generation).collect();
        assert_eq!(generations, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_result_is_delivered_after_explicit_reconnect() {
        let mut h = start(MemorySource::new(dc_page(3)), AppConfig::default(), false);
        sleep_ms(10_000).await;
        assert_eq!(h.transport.connect_attempts(), 5);
        assert!(h.drain().is_empty());

        h.transport.set_online(true);
        h.handle.reconnect().await.unwrap();
        sleep_ms(100).await;
        assert_eq!(h.transport.connect_attempts(), 6);
        assert_eq!(completes(&h.drain()).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn progressive_updates_precede_the_published_result() {
        let mut config = AppConfig::default();
        config.detection.progressive_updates = true;
        let mut h = start(MemorySource::new(dc_page(3)), config, true);
        sleep_ms(2000).await;

        let actions: Vec<&str> = h.drain().iter().map(|e| e.message.action()).collect();
        assert_eq!(actions, vec!["progressiveUpdate", "detectionComplete"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_agent() {
        let h = start(MemorySource::new(dc_page(3)), AppConfig::default(), true);
        h.handle.shutdown();
        h.task.await.unwrap();
        assert!(matches!(
            h.handle.page_changed().await,
            Err(AgentError::Stopped)
        ));
    }
}
