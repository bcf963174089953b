//! Messages exchanged between the page agent and UI consumers.
//!
//! The set is closed: every action is a variant of [`Message`], and handlers
//! match on it exhaustively. On the wire each message is a JSON object tagged
//! by its `action` field.

use serde::{Deserialize, Serialize};

use crate::model::{CachedResult, DetectionErrorReport, DetectionResult, PageInstanceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Message {
    /// Liveness probe; `timestamp` is milliseconds since the epoch.
    Ping { timestamp: i64 },
    /// Reply to [`Message::Ping`], echoing its timestamp.
    Pong { timestamp: i64 },
    /// The page instance is going away; drop anything pending for it.
    NavigationIntent { page_instance_id: PageInstanceId },
    /// Pre-stabilization preview. Never authoritative.
    ProgressiveUpdate {
        phase: ProgressPhase,
        partial: DetectionResult,
    },
    /// A stabilized, published result.
    #[serde(alias = "formDetected")]
    DetectionComplete { result: DetectionResult },
    DetectionError(DetectionErrorReport),
    /// Pull the last-known result for a page instance.
    GetDetectionResult { page_instance_id: PageInstanceId },
    /// Reply to [`Message::GetDetectionResult`].
    CachedResult { cached: Option<CachedResult> },
    /// Force a new detection cycle.
    TriggerDetection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    ToConsumer,
    ToAgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Detecting,
    Stabilizing,
}

impl Message {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "ping",
            Self::Pong { .. } => "pong",
            Self::NavigationIntent { .. } => "navigationIntent",
            Self::ProgressiveUpdate { .. } => "progressiveUpdate",
            Self::DetectionComplete { .. } => "detectionComplete",
            Self::DetectionError(_) => "detectionError",
            Self::GetDetectionResult { .. } => "getDetectionResult",
            Self::CachedResult { .. } => "cachedResult",
            Self::TriggerDetection => "triggerDetection",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::Ping { .. } | Self::GetDetectionResult { .. } | Self::TriggerDetection => {
                Direction::ToAgent
            }
            Self::Pong { .. }
            | Self::NavigationIntent { .. }
            | Self::ProgressiveUpdate { .. }
            | Self::DetectionComplete { .. }
            | Self::DetectionError(_)
            | Self::CachedResult { .. } => Direction::ToConsumer,
        }
    }
}

/// The unit a transport carries: a message addressed to one page instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub page_instance_id: PageInstanceId,
    /// Per-channel send order; consumers may use it to detect duplicates.
    pub sequence: u64,
    pub message: Message,
}

/// Presentation-only bucketing of a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn from_confidence(confidence: u8) -> Self {
        match confidence {
            80.. => Self::High,
            60..=79 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Jurisdiction, Section};
    use chrono::{TimeZone, Utc};

    fn sample_result() -> DetectionResult {
        DetectionResult {
            page_instance_id: PageInstanceId(4),
            url: "https://mytax.dc.gov/".into(),
            jurisdiction: Jurisdiction {
                code: "DC".into(),
                prior: 80,
            },
            confidence: 83,
            is_registration_form: true,
            sections: vec![Section::ungrouped()],
            field_count: 0,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            generation: 9,
        }
    }

    #[test]
    fn action_tag_is_camel_case() {
        let msg = Message::NavigationIntent {
            page_instance_id: PageInstanceId(12),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["action"], "navigationIntent");
        assert_eq!(json["pageInstanceId"], 12);
    }

    #[test]
    fn trigger_detection_is_bare_action() {
        let json = serde_json::to_string(&Message::TriggerDetection).unwrap();
        assert_eq!(json, r#"{"action":"triggerDetection"}"#);
    }

    #[test]
    fn form_detected_alias_accepted() {
        let result = sample_result();
        let mut json = serde_json::to_value(Message::DetectionComplete {
            result: result.clone(),
        })
        .unwrap();
        json["action"] = "formDetected".into();
        let parsed: Message = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, Message::DetectionComplete { result });
    }

    #[test]
    fn detection_error_fields_are_flat() {
        let msg = Message::DetectionError(DetectionErrorReport {
            message: "snapshot unavailable".into(),
            context: "detection".into(),
            is_fatal: true,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["action"], "detectionError");
        assert_eq!(json["isFatal"], true);
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn envelope_preserves_result() {
        let env = Envelope {
            page_instance_id: PageInstanceId(4),
            sequence: 2,
            message: Message::DetectionComplete {
                result: sample_result(),
            },
        };
        let json = serde_json::to_string(&env).unwrap();
        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn directions() {
        assert_eq!(Message::TriggerDetection.direction(), Direction::ToAgent);
        assert_eq!(
            Message::Ping { timestamp: 1 }.direction(),
            Direction::ToAgent
        );
        assert_eq!(
            Message::CachedResult { cached: None }.direction(),
            Direction::ToConsumer
        );
    }

    #[test]
    fn severity_buckets() {
        assert_eq!(Severity::from_confidence(100), Severity::High);
        assert_eq!(Severity::from_confidence(80), Severity::High);
        assert_eq!(Severity::from_confidence(79), Severity::Medium);
        assert_eq!(Severity::from_confidence(60), Severity::Medium);
        assert_eq!(Severity::from_confidence(59), Severity::Low);
    }
}
