//! Detection engine: jurisdiction analysis, field classification and section
//! grouping, composed into a single [`DetectionResult`].
//!
//! Everything here is pure. Given the same snapshot, configuration and
//! generation, [`Engine::detect_at`] returns the same result.

mod error;

pub mod classifier;
pub mod jurisdiction;
pub mod patterns;
pub mod sections;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use formscout_core::{
    DetectionConfig, DetectionResult, FieldCategory, FieldClassification, PageInstanceId,
    PageSnapshot, ScoringWeights,
};
use tracing::debug;

pub use classifier::{CategoryScore, FieldClassifier};
pub use error::DetectError;
pub use jurisdiction::JurisdictionAnalyzer;
pub use patterns::PatternTable;
pub use sections::{group_fields, SectionDetector};

/// The composed detection pipeline. Build once per process and share.
pub struct Engine {
    analyzer: JurisdictionAnalyzer,
    classifier: FieldClassifier,
    detector: SectionDetector,
    config: DetectionConfig,
}

impl Engine {
    pub fn new(config: DetectionConfig) -> Result<Self, DetectError> {
        Ok(Self {
            analyzer: JurisdictionAnalyzer::builtin()?,
            classifier: FieldClassifier::builtin(config.scoring.clone())?,
            detector: SectionDetector::new(config.sections.clone()),
            config,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn classifier(&self) -> &FieldClassifier {
        &self.classifier
    }

    pub fn detect(
        &self,
        snapshot: &PageSnapshot,
        page: PageInstanceId,
        generation: u64,
    ) -> DetectionResult {
        self.detect_at(snapshot, page, generation, Utc::now())
    }

    /// One detection pass with an explicit timestamp.
    pub fn detect_at(
        &self,
        snapshot: &PageSnapshot,
        page: PageInstanceId,
        generation: u64,
        timestamp: DateTime<Utc>,
    ) -> DetectionResult {
        let jurisdiction = self.analyzer.analyze(&snapshot.url);

        let classified: Vec<FieldClassification> =
            group_fields(snapshot, &self.config.sections)
                .into_iter()
                .map(|entry| {
                    self.classifier
                        .classify_grouped(&entry.descriptor, entry.grouping, &jurisdiction)
                })
                .collect();

        let confidence = aggregate_confidence(jurisdiction.prior, &classified, &self.config.scoring);
        let field_count = classified.len();
        let sections = self.detector.detect(snapshot, classified);

        debug!(
            page = %page,
            generation,
            jurisdiction = %jurisdiction.code,
            fields = field_count,
            sections = sections.len(),
            confidence,
            "detection pass complete"
        );

        DetectionResult {
            page_instance_id: page,
            url: snapshot.url.clone(),
            is_registration_form: field_count > 0
                && confidence >= self.config.scoring.form_threshold,
            jurisdiction,
            confidence,
            sections,
            field_count,
            timestamp,
            generation,
        }
    }
}

/// Overall confidence from the jurisdiction prior, the mean confidence of
/// fields that were classified into a real category, and how many of the
/// key registration categories were found. A page without fields scores 0.
pub fn aggregate_confidence(
    prior: u8,
    fields: &[FieldClassification],
    weights: &ScoringWeights,
) -> u8 {
    if fields.is_empty() {
        return 0;
    }

    let known: Vec<u32> = fields
        .iter()
        .filter(|f| f.category != FieldCategory::Other)
        .map(|f| f.confidence as u32)
        .collect();
    let field_mean = if known.is_empty() {
        0
    } else {
        known.iter().sum::<u32>() / known.len() as u32
    };

    let found: BTreeSet<FieldCategory> = fields
        .iter()
        .map(|f| f.category)
        .filter(|c| FieldCategory::KEY.contains(c))
        .collect();
    let coverage = found.len() as u32 * 100 / FieldCategory::KEY.len() as u32;

    let total = prior.min(100) as u32 * weights.prior_weight_pct
        + field_mean * weights.field_weight_pct
        + coverage * weights.coverage_weight_pct;
    (total / 100).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use formscout_core::{Element, InputAttrs, InputKind, Style};

    fn heading(text: &str, top: f32) -> Element {
        Element {
            tag: "h2".into(),
            text: text.into(),
            top_px: top,
            style: Style::default(),
            input: None,
        }
    }

    fn field(label: &str, kind: InputKind, top: f32) -> Element {
        Element {
            tag: "input".into(),
            text: String::new(),
            top_px: top,
            style: Style::default(),
            input: Some(InputAttrs {
                kind,
                label: label.into(),
                ..Default::default()
            }),
        }
    }

    fn dc_snapshot() -> PageSnapshot {
        PageSnapshot::new(
            "https://mytax.dc.gov/_/#2",
            vec![
                heading("Business Information", 0.0),
                field("Business Name", InputKind::Text, 40.0),
                field("Employer Identification Number", InputKind::Text, 80.0),
                field("Email", InputKind::Email, 120.0),
            ],
        )
    }

    fn engine() -> Engine {
        Engine::new(DetectionConfig::default()).unwrap()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn dc_registration_page() {
        let result = engine().detect_at(&dc_snapshot(), PageInstanceId(1), 1, at());

        assert_eq!(result.jurisdiction.code, "DC");
        assert_eq!(result.sections.len(), 1);
        let section = result.section("Business Information").unwrap();
        assert_eq!(section.fields.len(), 3);

        let ein = section
            .fields
            .iter()
            .find(|f| f.category == FieldCategory::Ein)
            .unwrap();
        assert!(ein.confidence >= 80);

        assert_eq!(result.field_count, 3);
        assert!(result.is_registration_form);
        // prior 80·30% + fields 100·50% + coverage 40·20%
        assert_eq!(result.confidence, 24 + 50 + 8);
    }

    #[test]
    fn prior_moves_overall_confidence() {
        let e = engine();
        let dc = e.detect_at(&dc_snapshot(), PageInstanceId(1), 1, at());
        let mut elsewhere = dc_snapshot();
        elsewhere.url = "https://example.com/signup".into();
        let other = e.detect_at(&elsewhere, PageInstanceId(1), 1, at());
        assert!(dc.confidence > other.confidence);
    }

    #[test]
    fn page_without_fields_scores_zero() {
        let snap = PageSnapshot::new("https://mytax.dc.gov/", vec![heading("Welcome", 0.0)]);
        let result = engine().detect_at(&snap, PageInstanceId(1), 1, at());
        assert_eq!(result.confidence, 0);
        assert_eq!(result.field_count, 0);
        assert!(result.sections.is_empty());
        assert!(!result.is_registration_form);
    }

    #[test]
    fn detection_is_idempotent() {
        let e = engine();
        let a = e.detect_at(&dc_snapshot(), PageInstanceId(1), 1, at());
        let b = e.detect_at(&dc_snapshot(), PageInstanceId(1), 1, at());
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn result_survives_json_round_trip() {
        let result = engine().detect_at(&dc_snapshot(), PageInstanceId(3), 7, at());
        let json = serde_json::to_string(&result).unwrap();
        let back: DetectionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.generation, 7);
    }

    #[test]
    fn aggregate_ignores_other_fields_in_mean() {
        let fc = |category, confidence| FieldClassification {
            field: formscout_core::FieldDescriptor {
                element: formscout_core::ElementId(0),
                kind: InputKind::Text,
                name: String::new(),
                html_id: String::new(),
                label: String::new(),
                placeholder: String::new(),
                nearby_text: vec![],
            },
            category,
            confidence,
            matched_rules: vec![],
            grouping: Default::default(),
        };
        let w = ScoringWeights::default();
        let only_other = [fc(FieldCategory::Other, 10)];
        assert_eq!(aggregate_confidence(50, &only_other, &w), 15);

        let mixed = [fc(FieldCategory::Ein, 90), fc(FieldCategory::Other, 10)];
        // 50·30% + 90·50% + 20·20%
        assert_eq!(aggregate_confidence(50, &mixed, &w), 15 + 45 + 4);
    }
}
