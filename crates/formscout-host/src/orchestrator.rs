//! Debounce-then-commit state machine for one page instance.
//!
//! ```text
//! Idle → Detecting → Stabilizing → Published
//!   ↑________ Cancelled ←________ (any, on navigation)
//! ```
//!
//! A candidate result is held for the settle delay; a newer candidate
//! replaces it and restarts the timer. Only a candidate that survives the
//! whole window is published. Candidates carry the generation they were
//! started with, and anything not from the current generation is dropped.

use std::fmt;
use std::time::Duration;

use formscout_core::{DetectionConfig, DetectionResult, PageInstanceId};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionPhase {
    Idle,
    Detecting,
    Stabilizing,
    Published,
    Cancelled,
}

impl fmt::Display for DetectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Detecting => "detecting",
            Self::Stabilizing => "stabilizing",
            Self::Published => "published",
            Self::Cancelled => "cancelled",
        })
    }
}

/// What [`Orchestrator::candidate`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Held; nothing was pending before.
    Held,
    /// Held in place of an earlier candidate.
    Replaced,
    /// From an old generation; dropped.
    Rejected,
}

/// Result of a failed snapshot attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    RetryAt(Instant),
    Exhausted { attempts: u32 },
}

#[derive(Debug)]
pub struct Orchestrator {
    page: PageInstanceId,
    phase: DetectionPhase,
    generation: u64,
    held: Option<DetectionResult>,
    settle_at: Option<Instant>,
    settle_delay: Duration,
    attempts: u32,
    max_attempts: u32,
    retry_at: Option<Instant>,
    retry_delay: Duration,
    last_published: Option<DetectionResult>,
}

impl Orchestrator {
    pub fn new(page: PageInstanceId, config: &DetectionConfig) -> Self {
        Self {
            page,
            phase: DetectionPhase::Idle,
            generation: 0,
            held: None,
            settle_at: None,
            settle_delay: config.settle_delay(),
            attempts: 0,
            max_attempts: config.max_detection_attempts.max(1),
            retry_at: None,
            retry_delay: config.detection_retry_delay(),
            last_published: None,
        }
    }

    pub fn phase(&self) -> DetectionPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the held candidate becomes publishable.
    pub fn settle_deadline(&self) -> Option<Instant> {
        self.settle_at
    }

    /// When the next snapshot attempt of the current cycle is due.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry_at
    }

    pub fn held(&self) -> Option<&DetectionResult> {
        self.held.as_ref()
    }

    pub fn last_published(&self) -> Option<&DetectionResult> {
        self.last_published.as_ref()
    }

    /// Start a detection cycle and return its generation. A pending settle
    /// timer is suspended until the cycle produces a candidate.
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.attempts = 0;
        self.retry_at = None;
        self.settle_at = None;
        self.transition(DetectionPhase::Detecting);
        self.generation
    }

    /// Count one snapshot attempt of the current cycle.
    pub fn start_attempt(&mut self) -> u32 {
        self.retry_at = None;
        self.attempts += 1;
        self.attempts
    }

    /// Record a failed snapshot attempt: either schedule the next one or
    /// give up on this cycle.
    pub fn attempt_failed(&mut self, now: Instant) -> AttemptOutcome {
        if self.attempts >= self.max_attempts {
            let attempts = self.attempts;
            self.retry_at = None;
            // An earlier candidate is still the best known state of the page.
            if self.held.is_some() {
                self.settle_at = Some(now + self.settle_delay);
                self.transition(DetectionPhase::Stabilizing);
            } else {
                self.transition(DetectionPhase::Idle);
            }
            return AttemptOutcome::Exhausted { attempts };
        }
        let at = now + self.retry_delay;
        self.retry_at = Some(at);
        AttemptOutcome::RetryAt(at)
    }

    /// Offer a candidate produced for `result.generation`.
    pub fn candidate(&mut self, result: DetectionResult, now: Instant) -> CandidateOutcome {
        if result.generation != self.generation || self.phase != DetectionPhase::Detecting {
            debug!(
                page = %self.page,
                generation = result.generation,
                current = self.generation,
                "dropping stale candidate"
            );
            return CandidateOutcome::Rejected;
        }
        let outcome = if self.held.is_some() {
            CandidateOutcome::Replaced
        } else {
            CandidateOutcome::Held
        };
        self.held = Some(result);
        self.settle_at = Some(now + self.settle_delay);
        self.transition(DetectionPhase::Stabilizing);
        outcome
    }

    /// Release the held candidate if its settle window has fully elapsed.
    pub fn fire(&mut self, now: Instant) -> Option<DetectionResult> {
        if self.phase != DetectionPhase::Stabilizing || self.settle_at.is_none_or(|at| at > now) {
            return None;
        }
        self.settle_at = None;
        let result = self.held.take()?;
        self.last_published = Some(result.clone());
        self.transition(DetectionPhase::Published);
        Some(result)
    }

    /// Navigation: discard anything pending and return to `Idle`. Returns
    /// whether a held or in-flight candidate was discarded.
    pub fn cancel(&mut self) -> bool {
        let discarded = self.held.take().is_some() || self.phase == DetectionPhase::Detecting;
        self.settle_at = None;
        self.retry_at = None;
        self.attempts = 0;
        // Anything still carrying the old generation is now stale.
        self.generation += 1;
        self.transition(DetectionPhase::Cancelled);
        self.transition(DetectionPhase::Idle);
        discarded
    }

    fn transition(&mut self, to: DetectionPhase) {
        if self.phase != to {
            debug!(page = %self.page, from = %self.phase, %to, generation = self.generation, "detection phase");
            self.phase = to;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use formscout_core::Jurisdiction;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(PageInstanceId(1), &DetectionConfig::default())
    }

    fn result(generation: u64, field_count: usize) -> DetectionResult {
        DetectionResult {
            page_instance_id: PageInstanceId(1),
            url: "https://mytax.dc.gov/".into(),
            jurisdiction: Jurisdiction {
                code: "DC".into(),
                prior: 80,
            },
            confidence: 70,
            is_registration_form: true,
            sections: vec![],
            field_count,
            timestamp: Utc::now(),
            generation,
        }
    }

    const SETTLE: Duration = Duration::from_millis(1500);

    #[tokio::test(start_paused = true)]
    async fn publishes_after_settle_window() {
        let mut o = orchestrator();
        let t0 = Instant::now();
        let g = o.begin();
        assert_eq!(o.candidate(result(g, 3), t0), CandidateOutcome::Held);
        assert_eq!(o.phase(), DetectionPhase::Stabilizing);

        assert!(o.fire(t0 + SETTLE - Duration::from_millis(1)).is_none());
        let published = o.fire(t0 + SETTLE).unwrap();
        assert_eq!(published.generation, g);
        assert_eq!(o.phase(), DetectionPhase::Published);
        assert_eq!(o.last_published().unwrap().generation, g);
        assert!(o.fire(t0 + SETTLE * 2).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_candidate_replaces_and_restarts_timer() {
        let mut o = orchestrator();
        let t0 = Instant::now();
        let g1 = o.begin();
        o.candidate(result(g1, 2), t0);

        let t1 = t0 + Duration::from_millis(800);
        let g2 = o.begin();
        assert_eq!(o.phase(), DetectionPhase::Detecting);
        assert!(o.fire(t0 + SETTLE).is_none());
        assert_eq!(o.candidate(result(g2, 3), t1), CandidateOutcome::Replaced);

        assert!(o.fire(t0 + SETTLE).is_none());
        let published = o.fire(t1 + SETTLE).unwrap();
        assert_eq!(published.field_count, 3);
        assert_eq!(published.generation, g2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_rejected() {
        let mut o = orchestrator();
        let g1 = o.begin();
        o.begin();
        assert_eq!(
            o.candidate(result(g1, 1), Instant::now()),
            CandidateOutcome::Rejected
        );
        assert!(o.held().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_held_candidate() {
        let mut o = orchestrator();
        let t0 = Instant::now();
        let g = o.begin();
        o.candidate(result(g, 3), t0);

        assert!(o.cancel());
        assert_eq!(o.phase(), DetectionPhase::Idle);
        assert!(o.settle_deadline().is_none());
        assert!(o.fire(t0 + SETTLE * 2).is_none());
        // A pass started before navigation can no longer land.
        assert_eq!(o.candidate(result(g, 3), t0), CandidateOutcome::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_when_idle_discards_nothing() {
        let mut o = orchestrator();
        assert!(!o.cancel());
        assert_eq!(o.phase(), DetectionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_attempts_are_bounded() {
        let mut o = orchestrator();
        let t0 = Instant::now();
        o.begin();
        assert_eq!(o.start_attempt(), 1);
        assert_eq!(
            o.attempt_failed(t0),
            AttemptOutcome::RetryAt(t0 + Duration::from_millis(250))
        );
        o.start_attempt();
        assert!(matches!(o.attempt_failed(t0), AttemptOutcome::RetryAt(_)));
        o.start_attempt();
        assert_eq!(
            o.attempt_failed(t0),
            AttemptOutcome::Exhausted { attempts: 3 }
        );
        assert_eq!(o.phase(), DetectionPhase::Idle);
        assert!(o.retry_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_keeps_earlier_candidate() {
        let mut o = orchestrator();
        let t0 = Instant::now();
        let g = o.begin();
        o.candidate(result(g, 2), t0);

        o.begin();
        for _ in 0..3 {
            o.start_attempt();
            o.attempt_failed(t0);
        }
        assert_eq!(o.phase(), DetectionPhase::Stabilizing);
        assert_eq!(o.fire(t0 + SETTLE).unwrap().generation, g);
    }
}
