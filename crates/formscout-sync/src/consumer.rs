//! Consumer-side view of detection results.
//!
//! Envelopes may arrive late, twice, or out of order relative to newer
//! results (a flushed queue racing a fresh send). [`ResultView`] only ever
//! moves forward: a result is accepted when its generation is higher than the
//! last one accepted for the same page instance. Once a page instance has
//! navigated away it is retired, and nothing addressed to it is accepted again.

use std::collections::{HashMap, HashSet};

use formscout_core::{DetectionErrorReport, DetectionResult, Envelope, Message, PageInstanceId};
use tracing::debug;

/// What [`ResultView::apply`] did with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Accepted,
    Preview,
    Stale,
    Duplicate,
    Cleared,
    Error,
    Ignored,
}

#[derive(Debug, Default)]
struct PageView {
    last_sequence: u64,
    current: Option<DetectionResult>,
    stale: bool,
    preview: Option<DetectionResult>,
    last_error: Option<DetectionErrorReport>,
}

impl PageView {
    fn generation(&self) -> u64 {
        self.current.as_ref().map_or(0, |r| r.generation)
    }
}

#[derive(Debug, Default)]
pub struct ResultView {
    pages: HashMap<PageInstanceId, PageView>,
    retired: HashSet<PageInstanceId>,
}

impl ResultView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, envelope: Envelope) -> Applied {
        let page = envelope.page_instance_id;

        if let Message::NavigationIntent { page_instance_id } = &envelope.message {
            self.pages.remove(page_instance_id);
            self.retired.insert(*page_instance_id);
            debug!(page = %page_instance_id, "view cleared on navigation");
            return Applied::Cleared;
        }

        if self.retired.contains(&page) {
            debug!(page = %page, sequence = envelope.sequence, "envelope for retired page instance");
            return Applied::Stale;
        }

        let view = self.pages.entry(page).or_default();
        if envelope.sequence <= view.last_sequence {
            return Applied::Duplicate;
        }
        view.last_sequence = envelope.sequence;

        match envelope.message {
            Message::DetectionComplete { result } => accept(view, result, false),
            Message::CachedResult { cached: Some(cached) } => {
                accept(view, cached.result, cached.stale)
            }
            Message::CachedResult { cached: None } => Applied::Ignored,
            Message::ProgressiveUpdate { partial, .. } => {
                if partial.generation > view.generation() {
                    view.preview = Some(partial);
                    Applied::Preview
                } else {
                    Applied::Stale
                }
            }
            Message::DetectionError(report) => {
                view.last_error = Some(report);
                Applied::Error
            }
            Message::NavigationIntent { .. }
            | Message::Ping { .. }
            | Message::Pong { .. }
            | Message::GetDetectionResult { .. }
            | Message::TriggerDetection => Applied::Ignored,
        }
    }

    /// Whether the page instance has navigated away.
    pub fn is_retired(&self, page: PageInstanceId) -> bool {
        self.retired.contains(&page)
    }

    /// The authoritative result for a page instance.
    pub fn current(&self, page: PageInstanceId) -> Option<&DetectionResult> {
        self.pages.get(&page).and_then(|v| v.current.as_ref())
    }

    /// Whether the current result came from a stale cache read.
    pub fn is_stale(&self, page: PageInstanceId) -> bool {
        self.pages.get(&page).is_some_and(|v| v.stale)
    }

    /// Latest non-authoritative preview newer than the current result.
    pub fn preview(&self, page: PageInstanceId) -> Option<&DetectionResult> {
        self.pages.get(&page).and_then(|v| v.preview.as_ref())
    }

    pub fn last_error(&self, page: PageInstanceId) -> Option<&DetectionErrorReport> {
        self.pages.get(&page).and_then(|v| v.last_error.as_ref())
    }
}

fn accept(view: &mut PageView, result: DetectionResult, stale: bool) -> Applied {
    if result.generation <= view.generation() {
        return Applied::Stale;
    }
    if view
        .preview
        .as_ref()
        .is_some_and(|p| p.generation <= result.generation)
    {
        view.preview = None;
    }
    view.current = Some(result);
    view.stale = stale;
    Applied::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use formscout_core::{CachedResult, Jurisdiction, ProgressPhase};

    fn result(generation: u64) -> DetectionResult {
        DetectionResult {
            page_instance_id: PageInstanceId(1),
            url: "https://mytax.dc.gov/".into(),
            jurisdiction: Jurisdiction {
                code: "DC".into(),
                prior: 80,
            },
            confidence: 82,
            is_registration_form: true,
            sections: vec![],
            field_count: generation as usize,
            timestamp: Utc::now(),
            generation,
        }
    }

    fn env(sequence: u64, message: Message) -> Envelope {
        Envelope {
            page_instance_id: PageInstanceId(1),
            sequence,
            message,
        }
    }

    fn complete(generation: u64) -> Message {
        Message::DetectionComplete {
            result: result(generation),
        }
    }

    #[test]
    fn never_moves_backwards() {
        let mut view = ResultView::new();
        assert_eq!(view.apply(env(1, complete(2))), Applied::Accepted);
        assert_eq!(view.apply(env(2, complete(1))), Applied::Stale);
        assert_eq!(view.current(PageInstanceId(1)).unwrap().generation, 2);
        assert_eq!(view.apply(env(3, complete(3))), Applied::Accepted);
    }

    #[test]
    fn repeated_sequence_is_duplicate() {
        let mut view = ResultView::new();
        view.apply(env(1, complete(1)));
        assert_eq!(view.apply(env(1, complete(1))), Applied::Duplicate);
    }

    #[test]
    fn navigation_clears_page() {
        let mut view = ResultView::new();
        view.apply(env(1, complete(1)));
        let nav = Message::NavigationIntent {
            page_instance_id: PageInstanceId(1),
        };
        assert_eq!(view.apply(env(2, nav)), Applied::Cleared);
        assert!(view.current(PageInstanceId(1)).is_none());
        assert!(view.is_retired(PageInstanceId(1)));
    }

    #[test]
    fn late_result_after_navigation_is_stale() {
        let mut view = ResultView::new();
        assert_eq!(view.apply(env(1, complete(2))), Applied::Accepted);
        let nav = Message::NavigationIntent {
            page_instance_id: PageInstanceId(1),
        };
        assert_eq!(view.apply(env(3, nav)), Applied::Cleared);

        // Sent before the navigation, arrives after it.
        assert_eq!(view.apply(env(2, complete(1))), Applied::Stale);
        assert_eq!(view.apply(env(4, complete(5))), Applied::Stale);
        assert!(view.current(PageInstanceId(1)).is_none());
    }

    #[test]
    fn retiring_one_page_leaves_others_alone() {
        let mut view = ResultView::new();
        let nav = Message::NavigationIntent {
            page_instance_id: PageInstanceId(1),
        };
        view.apply(env(1, nav));

        let mut next = env(1, complete(1));
        next.page_instance_id = PageInstanceId(2);
        assert_eq!(view.apply(next), Applied::Accepted);
        assert!(view.current(PageInstanceId(2)).is_some());
    }

    #[test]
    fn preview_is_separate_and_superseded() {
        let mut view = ResultView::new();
        let preview = Message::ProgressiveUpdate {
            phase: ProgressPhase::Stabilizing,
            partial: result(1),
        };
        assert_eq!(view.apply(env(1, preview)), Applied::Preview);
        assert!(view.current(PageInstanceId(1)).is_none());
        assert!(view.preview(PageInstanceId(1)).is_some());

        view.apply(env(2, complete(1)));
        assert!(view.preview(PageInstanceId(1)).is_none());
        assert_eq!(view.current(PageInstanceId(1)).unwrap().generation, 1);
    }

    #[test]
    fn cached_reply_carries_staleness() {
        let mut view = ResultView::new();
        let cached = Message::CachedResult {
            cached: Some(CachedResult {
                result: result(5),
                cached_at: Utc::now(),
                stale: true,
            }),
        };
        assert_eq!(view.apply(env(1, cached)), Applied::Accepted);
        assert!(view.is_stale(PageInstanceId(1)));
        view.apply(env(2, complete(6)));
        assert!(!view.is_stale(PageInstanceId(1)));
    }

    #[test]
    fn errors_are_recorded() {
        let mut view = ResultView::new();
        let report = DetectionErrorReport {
            message: "detection failed".into(),
            context: "snapshot".into(),
            is_fatal: true,
        };
        assert_eq!(
            view.apply(env(1, Message::DetectionError(report))),
            Applied::Error
        );
        assert!(view.last_error(PageInstanceId(1)).unwrap().is_fatal);
    }
}
