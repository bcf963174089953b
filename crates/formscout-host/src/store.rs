//! Per-page-instance records and their lifecycle.
//!
//! Every piece of mutable per-instance state (orchestrator, channel, error
//! reporter) lives in a [`PageContext`] owned by the [`InstanceStore`].
//! `register` creates one; `remove` takes it out of the store and tears it
//! down. Teardown consumes the context, so it runs exactly once.

use std::collections::BTreeMap;
use std::sync::Arc;

use formscout_core::{AppConfig, PageInstanceId};
use formscout_sync::{Channel, Transport};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::orchestrator::Orchestrator;
use crate::reporter::ErrorReporter;

pub struct PageContext {
    pub page: PageInstanceId,
    pub orchestrator: Orchestrator,
    pub channel: Channel,
    pub reporter: ErrorReporter,
    cancel: CancellationToken,
}

impl PageContext {
    /// Cancelled when this instance is torn down or the store shuts down.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn teardown(mut self) {
        self.cancel.cancel();
        let discarded = self.orchestrator.cancel();
        self.channel.teardown();
        info!(
            page = %self.page,
            discarded_candidate = discarded,
            suppressed_reports = self.reporter.suppressed(),
            "page instance torn down"
        );
    }
}

pub struct InstanceStore {
    config: AppConfig,
    instances: BTreeMap<PageInstanceId, PageContext>,
    next_id: u64,
    root: CancellationToken,
}

impl InstanceStore {
    pub fn new(config: AppConfig) -> Self {
        Self::with_token(config, CancellationToken::new())
    }

    /// Instance tokens are children of `root`; cancelling it cancels them all.
    pub fn with_token(config: AppConfig, root: CancellationToken) -> Self {
        Self {
            config,
            instances: BTreeMap::new(),
            next_id: 0,
            root,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn register(&mut self, transport: Arc<dyn Transport>) -> PageInstanceId {
        self.next_id += 1;
        let page = PageInstanceId(self.next_id);
        let ctx = PageContext {
            page,
            orchestrator: Orchestrator::new(page, &self.config.detection),
            channel: Channel::new(page, transport, self.config.channel.clone()),
            reporter: ErrorReporter::new(page, self.config.detection.fatal_report_cap),
            cancel: self.root.child_token(),
        };
        self.instances.insert(page, ctx);
        info!(page = %page, live = self.instances.len(), "page instance registered");
        page
    }

    pub fn get(&self, page: PageInstanceId) -> Option<&PageContext> {
        self.instances.get(&page)
    }

    pub fn get_mut(&mut self, page: PageInstanceId) -> Option<&mut PageContext> {
        self.instances.get_mut(&page)
    }

    pub fn contains(&self, page: PageInstanceId) -> bool {
        self.instances.contains_key(&page)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Tear an instance down. Returns `false` if it was not registered
    /// (already removed, or never existed).
    pub fn remove(&mut self, page: PageInstanceId) -> bool {
        match self.instances.remove(&page) {
            Some(ctx) => {
                ctx.teardown();
                true
            }
            None => false,
        }
    }

    /// Tear down every live instance.
    pub fn clear(&mut self) {
        let instances = std::mem::take(&mut self.instances);
        for ctx in instances.into_values() {
            ctx.teardown();
        }
    }
}

impl Drop for InstanceStore {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formscout_sync::LoopbackTransport;

    fn store() -> (InstanceStore, Arc<dyn Transport>) {
        let (transport, _rx) = LoopbackTransport::new();
        (InstanceStore::new(AppConfig::default()), Arc::new(transport))
    }

    #[tokio::test]
    async fn register_assigns_fresh_ids() {
        let (mut s, t) = store();
        let a = s.register(t.clone());
        let b = s.register(t);
        assert_ne!(a, b);
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(a).unwrap().page, a);
    }

    #[tokio::test]
    async fn remove_tears_down_once() {
        let (mut s, t) = store();
        let page = s.register(t);
        let token = s.get(page).unwrap().cancellation();

        assert!(s.remove(page));
        assert!(token.is_cancelled());
        assert!(!s.contains(page));
        assert!(!s.remove(page));
    }

    #[tokio::test]
    async fn removing_one_leaves_others_running() {
        let (mut s, t) = store();
        let a = s.register(t.clone());
        let b = s.register(t);
        let b_token = s.get(b).unwrap().cancellation();
        s.remove(a);
        assert!(!b_token.is_cancelled());
    }

    #[tokio::test]
    async fn root_cancellation_reaches_instances() {
        let (transport, _rx) = LoopbackTransport::new();
        let root = CancellationToken::new();
        let mut s = InstanceStore::with_token(AppConfig::default(), root.clone());
        let page = s.register(Arc::new(transport));
        let token = s.get(page).unwrap().cancellation();
        root.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn dropping_store_tears_everything_down() {
        let (mut s, t) = store();
        let page = s.register(t);
        let token = s.get(page).unwrap().cancellation();
        drop(s);
        assert!(token.is_cancelled());
    }
}
