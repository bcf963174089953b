//! Rule-based field classification.
//!
//! Each category in the [`PatternTable`] is scored against the field's text:
//! label, name/id and placeholder are *primary* text and earn full weight;
//! nearby free text is *secondary* and earns `secondary_pct` of it. The best
//! category at or above `min_score` wins, ties going to the higher priority.
//! Scoring is integer arithmetic over an ordered table, so the same field
//! always yields the same classification.

use formscout_core::{
    FieldCategory, FieldClassification, FieldDescriptor, FieldGrouping, Jurisdiction,
    ScoringWeights,
};

use crate::error::DetectError;
use crate::patterns::{contains_word, normalize, split_identifier, ClassificationPattern, PatternTable};

/// Score of one category for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryScore {
    pub category: FieldCategory,
    pub priority: u32,
    pub score: i32,
    pub rules: Vec<String>,
}

/// The text a field offers for matching, already normalized.
struct FieldText {
    primary: String,
    secondary: String,
}

impl FieldText {
    fn of(field: &FieldDescriptor) -> Self {
        let primary = [
            normalize(&field.label),
            split_identifier(&field.name),
            split_identifier(&field.html_id),
            normalize(&field.placeholder),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        let secondary = field
            .nearby_text
            .iter()
            .map(|t| normalize(t))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Self { primary, secondary }
    }
}

pub struct FieldClassifier {
    table: PatternTable,
    weights: ScoringWeights,
}

impl FieldClassifier {
    pub fn new(table: PatternTable, weights: ScoringWeights) -> Self {
        Self { table, weights }
    }

    /// Builtin pattern table with the given weights.
    pub fn builtin(weights: ScoringWeights) -> Result<Self, DetectError> {
        Ok(Self::new(PatternTable::builtin()?, weights))
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Classify a single field.
    pub fn classify(&self, field: &FieldDescriptor, jurisdiction: &Jurisdiction) -> FieldClassification {
        self.classify_grouped(field, FieldGrouping::Single, jurisdiction)
    }

    /// Classify a (possibly collapsed) field entry.
    pub fn classify_grouped(
        &self,
        field: &FieldDescriptor,
        grouping: FieldGrouping,
        jurisdiction: &Jurisdiction,
    ) -> FieldClassification {
        let mut best: Option<CategoryScore> = None;
        for candidate in self.score_all(field, jurisdiction) {
            if candidate.score < self.weights.min_score as i32 {
                continue;
            }
            let better = match &best {
                None => true,
                Some(b) => (candidate.score, candidate.priority) > (b.score, b.priority),
            };
            if better {
                best = Some(candidate);
            }
        }

        match best {
            Some(winner) => FieldClassification {
                field: field.clone(),
                category: winner.category,
                confidence: self.confidence(winner.score),
                matched_rules: winner.rules,
                grouping,
            },
            None => FieldClassification {
                field: field.clone(),
                category: FieldCategory::Other,
                confidence: self.weights.fallback_confidence.min(100),
                matched_rules: Vec::new(),
                grouping,
            },
        }
    }

    /// Scores for every category in table order, for diagnostics.
    pub fn score_all(&self, field: &FieldDescriptor, jurisdiction: &Jurisdiction) -> Vec<CategoryScore> {
        let text = FieldText::of(field);
        self.table
            .iter()
            .map(|entry| self.score_entry(entry, field, &text, jurisdiction))
            .collect()
    }

    fn score_entry(
        &self,
        entry: &ClassificationPattern,
        field: &FieldDescriptor,
        text: &FieldText,
        jurisdiction: &Jurisdiction,
    ) -> CategoryScore {
        let w = &self.weights;
        let secondary = |weight: u32| (weight * w.secondary_pct / 100) as i32;
        let mut score = 0i32;
        let mut rules = Vec::new();

        for re in &entry.patterns {
            if re.is_match(&text.primary) {
                score += w.pattern_weight as i32;
                rules.push(format!("pattern:{}", re.as_str()));
            } else if re.is_match(&text.secondary) {
                score += secondary(w.pattern_weight);
                rules.push(format!("pattern~nearby:{}", re.as_str()));
            }
        }

        for kw in &entry.keywords {
            if contains_word(&text.primary, kw) {
                score += w.keyword_weight as i32;
                rules.push(format!("keyword:{kw}"));
            } else if contains_word(&text.secondary, kw) {
                score += secondary(w.keyword_weight);
                rules.push(format!("keyword~nearby:{kw}"));
            }
        }

        if entry.kinds.contains(&field.kind) {
            score += w.kind_affinity_weight as i32;
            rules.push(format!("kind:{}", field.kind.as_str()));
        }

        // Overrides adjust existing evidence; they never create it.
        if score > 0
            && let Some(delta) = entry.overrides.get(&jurisdiction.code)
        {
            score += delta;
            rules.push(format!("override:{}{:+}", jurisdiction.code, delta));
        }

        CategoryScore {
            category: entry.category,
            priority: entry.priority,
            score,
            rules,
        }
    }

    /// Map a winning score onto 0..=100.
    fn confidence(&self, score: i32) -> u8 {
        let full = self.weights.full_score.max(1) as i64;
        let scaled = (score.max(0) as i64 * 100) / full;
        scaled.min(100) as u8
    }
}
