//! Category pattern table.
//!
//! Patterns and keywords are written against *normalized* text: lowercase,
//! punctuation folded to single spaces, identifiers split into words (see
//! [`normalize`] and [`split_identifier`]).

use std::collections::BTreeMap;

use formscout_core::{FieldCategory, InputKind};
use regex::Regex;

use crate::error::DetectError;

/// Declarative form of a [`ClassificationPattern`].
#[derive(Debug, Clone, Copy)]
pub struct PatternSpec {
    pub category: FieldCategory,
    /// Breaks score ties; higher wins.
    pub priority: u32,
    pub patterns: &'static [&'static str],
    pub keywords: &'static [&'static str],
    /// Input kinds that hint at this category.
    pub kinds: &'static [InputKind],
    /// Jurisdiction code → weight delta.
    pub overrides: &'static [(&'static str, i32)],
}

pub const BUILTIN_PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        category: FieldCategory::BusinessName,
        priority: 90,
        patterns: &[
            r"\b(business|company|corporate|corporation|entity|organization|llc|firm) name\b",
            r"\blegal name\b",
            r"\bname of (the )?(business|company|entity|corporation|organization)\b",
        ],
        keywords: &["business", "company", "legal", "entity", "name"],
        kinds: &[],
        overrides: &[("FL", 5)],
    },
    PatternSpec {
        category: FieldCategory::DbaName,
        priority: 80,
        patterns: &[
            r"\bdoing business as\b",
            r"\bdba\b",
            r"\b(trade|fictitious|assumed) name\b",
        ],
        keywords: &["dba", "trade", "fictitious", "assumed"],
        kinds: &[],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::EntityType,
        priority: 85,
        patterns: &[
            r"\b(entity|business|organization|company) (type|structure)\b",
            r"\btype of (business|entity|organization|company)\b",
            r"\b(legal|ownership) structure\b",
        ],
        keywords: &[
            "entity",
            "type",
            "structure",
            "llc",
            "corporation",
            "partnership",
            "proprietorship",
        ],
        kinds: &[InputKind::Select, InputKind::Radio],
        overrides: &[("CA", 5)],
    },
    PatternSpec {
        category: FieldCategory::Ein,
        priority: 100,
        patterns: &[
            r"\bf?ein\b",
            r"\bemployer identification\b",
            r"\bfederal (tax|employer) (id|identification)\b",
            r"\bfederal id\b",
        ],
        keywords: &["ein", "fein", "employer", "identification", "federal", "irs"],
        kinds: &[],
        overrides: &[("DC", 10), ("US", 15)],
    },
    PatternSpec {
        category: FieldCategory::StateTaxId,
        priority: 70,
        patterns: &[
            r"\bstate (tax|employer) (id|identification|number|account)\b",
            r"\b(sales|withholding|unemployment) tax (id|account|number)\b",
            r"\btax account number\b",
        ],
        keywords: &["state", "tax", "account", "withholding"],
        kinds: &[],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::Ssn,
        priority: 75,
        patterns: &[r"\bssn\b", r"\bsocial security\b", r"\bitin\b"],
        keywords: &["social", "security"],
        kinds: &[],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::Email,
        priority: 80,
        patterns: &[r"\be ?mail\b"],
        keywords: &["email", "contact"],
        kinds: &[InputKind::Email],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::Phone,
        priority: 80,
        patterns: &[r"\b(tele)?phone\b", r"\bmobile\b", r"\bcell\b", r"\bfax\b"],
        keywords: &["phone", "number", "contact"],
        kinds: &[InputKind::Tel],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::Address,
        priority: 75,
        patterns: &[
            r"\b(street|mailing|physical|business|principal|office|registered office) address\b",
            r"\baddress line\b",
            r"\bstreet\b",
        ],
        keywords: &["address", "street", "suite", "apt"],
        kinds: &[],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::City,
        priority: 60,
        patterns: &[r"\bcity\b", r"\btown\b", r"\bmunicipality\b"],
        keywords: &["city"],
        kinds: &[],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::State,
        priority: 60,
        patterns: &[r"\bstate\b", r"\bprovince\b"],
        keywords: &["state"],
        kinds: &[InputKind::Select],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::Zip,
        priority: 60,
        patterns: &[r"\bzip\b", r"\bpostal code\b", r"\bzipcode\b"],
        keywords: &["zip", "postal"],
        kinds: &[],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::RegisteredAgent,
        priority: 90,
        patterns: &[
            r"\bregistered agent\b",
            r"\bresident agent\b",
            r"\bagent for service\b",
            r"\bstatutory agent\b",
        ],
        keywords: &["registered", "agent", "service of process"],
        kinds: &[],
        overrides: &[("DE", 10), ("NY", 5)],
    },
    PatternSpec {
        category: FieldCategory::OwnerName,
        priority: 65,
        patterns: &[
            r"\b(owner|member|officer|director|manager|principal|organizer|incorporator|partner) name\b",
            r"\b(first|last|full) name\b",
            r"\bname of (the )?(owner|officer|organizer)\b",
        ],
        keywords: &["owner", "officer", "member", "organizer", "first", "last"],
        kinds: &[],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::FormationDate,
        priority: 60,
        patterns: &[
            r"\b(formation|incorporation|organization|start|effective) date\b",
            r"\bdate (of )?(formation|incorporation|organization)\b",
            r"\bdate business (began|started)\b",
        ],
        keywords: &["date", "formation", "incorporation"],
        kinds: &[InputKind::Date],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::NaicsCode,
        priority: 70,
        patterns: &[r"\bnaics\b", r"\bsic code\b", r"\bindustry code\b"],
        keywords: &["naics", "industry"],
        kinds: &[],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::BusinessPurpose,
        priority: 55,
        patterns: &[
            r"\bpurpose\b",
            r"\bnature of (the )?business\b",
            r"\bbusiness activity\b",
            r"\bdescription of (the )?business\b",
        ],
        keywords: &["purpose", "activity", "describe"],
        kinds: &[InputKind::Textarea],
        overrides: &[],
    },
    PatternSpec {
        category: FieldCategory::Signature,
        priority: 50,
        patterns: &[r"\bsignature\b", r"\bsign here\b", r"\belectronically sign"],
        keywords: &["signature", "sign", "attest"],
        kinds: &[],
        overrides: &[],
    },
];

/// A compiled category entry.
#[derive(Debug, Clone)]
pub struct ClassificationPattern {
    pub category: FieldCategory,
    pub priority: u32,
    pub patterns: Vec<Regex>,
    pub keywords: Vec<String>,
    pub kinds: Vec<InputKind>,
    pub overrides: BTreeMap<String, i32>,
}

impl ClassificationPattern {
    pub fn compile(spec: &PatternSpec) -> Result<Self, DetectError> {
        let patterns = spec
            .patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| DetectError::Pattern {
                    category: spec.category.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            category: spec.category,
            priority: spec.priority,
            patterns,
            keywords: spec.keywords.iter().map(|k| k.to_string()).collect(),
            kinds: spec.kinds.to_vec(),
            overrides: spec
                .overrides
                .iter()
                .map(|(code, delta)| (code.to_string(), *delta))
                .collect(),
        })
    }
}

/// Read-only table of category patterns; build once and share.
#[derive(Debug, Clone)]
pub struct PatternTable {
    entries: Vec<ClassificationPattern>,
}

impl PatternTable {
    pub fn builtin() -> Result<Self, DetectError> {
        Self::from_specs(BUILTIN_PATTERNS)
    }

    pub fn from_specs(specs: &[PatternSpec]) -> Result<Self, DetectError> {
        let entries = specs
            .iter()
            .map(ClassificationPattern::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassificationPattern> {
        self.entries.iter()
    }

    pub fn get(&self, category: FieldCategory) -> Option<&ClassificationPattern> {
        self.entries.iter().find(|e| e.category == category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lowercase, fold every non-alphanumeric run to one space, trim.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Split a camelCase / snake_case / kebab-case identifier into
/// space-separated words.
///
/// `businessName` → `business name`, `txtEIN_number` → `txt ein number`.
pub fn split_identifier(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut spaced = String::with_capacity(ident.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if i > 0 && ch.is_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                spaced.push(' ');
            }
        }
        spaced.push(ch);
    }
    normalize(&spaced)
}

/// Whole-word (or whole-phrase) containment on normalized text.
pub fn contains_word(normalized: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    normalized
        .match_indices(word)
        .any(|(start, _)| {
            let end = start + word.len();
            let before_ok = start == 0 || normalized.as_bytes()[start - 1] == b' ';
            let after_ok = end == normalized.len() || normalized.as_bytes()[end] == b' ';
            before_ok && after_ok
        })
}
