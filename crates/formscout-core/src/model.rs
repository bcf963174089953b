//! Detection result types shared between the page agent and its consumers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::page::InputKind;

/// Stable position of an element within one page snapshot (document order).
///
/// Only meaningful for the snapshot it was taken from; never resolved against
/// a later snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub usize);

/// One logical lifetime of an analysed page (load until navigation/close).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageInstanceId(pub u64);

impl fmt::Display for PageInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// Semantic category a form field can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    BusinessName,
    DbaName,
    EntityType,
    Ein,
    StateTaxId,
    Ssn,
    Email,
    Phone,
    Address,
    City,
    State,
    Zip,
    RegisteredAgent,
    OwnerName,
    FormationDate,
    NaicsCode,
    BusinessPurpose,
    Signature,
    Other,
}

impl FieldCategory {
    /// Every category, `Other` last.
    pub const ALL: &'static [FieldCategory] = &[
        Self::BusinessName,
        Self::DbaName,
        Self::EntityType,
        Self::Ein,
        Self::StateTaxId,
        Self::Ssn,
        Self::Email,
        Self::Phone,
        Self::Address,
        Self::City,
        Self::State,
        Self::Zip,
        Self::RegisteredAgent,
        Self::OwnerName,
        Self::FormationDate,
        Self::NaicsCode,
        Self::BusinessPurpose,
        Self::Signature,
        Self::Other,
    ];

    /// Categories whose presence marks a page as a business-registration form.
    pub const KEY: &'static [FieldCategory] = &[
        Self::BusinessName,
        Self::EntityType,
        Self::Ein,
        Self::Address,
        Self::RegisteredAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessName => "business_name",
            Self::DbaName => "dba_name",
            Self::EntityType => "entity_type",
            Self::Ein => "ein",
            Self::StateTaxId => "state_tax_id",
            Self::Ssn => "ssn",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::City => "city",
            Self::State => "state",
            Self::Zip => "zip",
            Self::RegisteredAgent => "registered_agent",
            Self::OwnerName => "owner_name",
            Self::FormationDate => "formation_date",
            Self::NaicsCode => "naics_code",
            Self::BusinessPurpose => "business_purpose",
            Self::Signature => "signature",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of one candidate input, taken at analysis time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub element: ElementId,
    pub kind: InputKind,
    pub name: String,
    pub html_id: String,
    pub label: String,
    pub placeholder: String,
    pub nearby_text: Vec<String>,
}

/// How several inputs were collapsed into one field entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldGrouping {
    #[default]
    Single,
    /// Radio buttons sharing a group name; `options` are the option labels.
    RadioGroup { options: Vec<String> },
    /// Checkboxes in close proximity.
    CheckboxGroup { members: Vec<ElementId> },
}

impl FieldGrouping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::RadioGroup { .. } => "radio_group",
            Self::CheckboxGroup { .. } => "checkbox_group",
        }
    }
}

/// A field together with its assigned category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldClassification {
    pub field: FieldDescriptor,
    pub category: FieldCategory,
    /// 0..=100.
    pub confidence: u8,
    /// Rules that contributed to the winning score, for diagnostics.
    pub matched_rules: Vec<String>,
    #[serde(default)]
    pub grouping: FieldGrouping,
}

/// A run of fields under one validated header.
///
/// The ungrouped section has no title and level 0; it only ever appears first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: Option<String>,
    pub level: u8,
    pub fields: Vec<FieldClassification>,
}

impl Section {
    pub fn ungrouped() -> Self {
        Self {
            title: None,
            level: 0,
            fields: Vec::new(),
        }
    }

    pub fn is_ungrouped(&self) -> bool {
        self.title.is_none()
    }
}

/// Jurisdiction inferred from the page URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub code: String,
    /// Prior likelihood (0..=100) that a page here is a registration form.
    pub prior: u8,
}

impl Jurisdiction {
    pub const UNKNOWN_CODE: &'static str = "UNKNOWN";

    pub fn unknown(prior: u8) -> Self {
        Self {
            code: Self::UNKNOWN_CODE.to_string(),
            prior,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.code == Self::UNKNOWN_CODE
    }
}

/// The output of one detection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub page_instance_id: PageInstanceId,
    pub url: String,
    pub jurisdiction: Jurisdiction,
    /// Aggregate confidence, 0..=100.
    pub confidence: u8,
    pub is_registration_form: bool,
    pub sections: Vec<Section>,
    pub field_count: usize,
    pub timestamp: DateTime<Utc>,
    /// Strictly increasing per page instance.
    pub generation: u64,
}

impl DetectionResult {
    /// All fields in document order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldClassification> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.title.as_deref() == Some(title))
    }
}

/// A last-known result served while the channel is down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResult {
    pub result: DetectionResult,
    pub cached_at: DateTime<Utc>,
    /// Past the freshness TTL; still shown, but flagged.
    pub stale: bool,
}

/// Failure report surfaced to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionErrorReport {
    pub message: String,
    pub context: String,
    pub is_fatal: bool,
}
