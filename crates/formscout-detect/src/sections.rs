//! Visual section grouping.
//!
//! Pass 1 finds candidate headers (semantic headings, or short text styled
//! prominently) and keeps only those followed by at least `min_fields`
//! fields before the next candidate, without a gap larger than the distance
//! cutoff. Pass 2 walks the page again and hands each field to the most
//! recent validated header; fields before any header go to the ungrouped
//! section.

use std::collections::HashMap;

use formscout_core::{
    ElementId, Element, FieldClassification, FieldDescriptor, FieldGrouping, InputKind,
    PageSnapshot, Section, SectionConfig,
};
use tracing::debug;

/// A field entry ready for classification: a single input, a radio group, or
/// a cluster of checkboxes. `descriptor.element` is the first member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    pub descriptor: FieldDescriptor,
    pub grouping: FieldGrouping,
}

/// Collapse radio groups and adjacent checkboxes into single entries.
///
/// Radio buttons sharing a non-empty `name` become one entry at the position
/// of the first; its option labels are recorded and added to the entry's
/// nearby text. Consecutive checkboxes whose vertical gap is within
/// `checkbox_proximity_px` become one checkbox-group entry.
pub fn group_fields(snapshot: &PageSnapshot, config: &SectionConfig) -> Vec<FieldEntry> {
    let mut entries: Vec<FieldEntry> = Vec::new();
    let mut radio_groups: HashMap<String, usize> = HashMap::new();
    // Top of the last checkbox pushed, while the last entry is a checkbox.
    let mut checkbox_tail: Option<f32> = None;

    for d in snapshot.field_descriptors() {
        let top = top_of(snapshot, d.element);

        match d.kind {
            InputKind::Radio if !d.name.is_empty() => {
                if let Some(&idx) = radio_groups.get(&d.name) {
                    let entry = &mut entries[idx];
                    if !d.label.is_empty() {
                        entry.descriptor.nearby_text.push(d.label.clone());
                        if let FieldGrouping::RadioGroup { options } = &mut entry.grouping {
                            options.push(d.label);
                        }
                    }
                    continue;
                }
                radio_groups.insert(d.name.clone(), entries.len());
                let options: Vec<String> = Some(d.label.clone())
                    .filter(|l| !l.is_empty())
                    .into_iter()
                    .collect();
                let mut descriptor = d;
                // The first radio's label names an option, not the question.
                descriptor.nearby_text.extend(options.iter().cloned());
                descriptor.label.clear();
                entries.push(FieldEntry {
                    descriptor,
                    grouping: FieldGrouping::RadioGroup { options },
                });
                checkbox_tail = None;
            }
            InputKind::Checkbox => {
                let joins = checkbox_tail
                    .is_some_and(|prev| (top - prev).abs() <= config.checkbox_proximity_px);
                if joins && let Some(last) = entries.last_mut() {
                    let first = last.descriptor.element;
                    let member = d.element;
                    if !d.label.is_empty() {
                        last.descriptor.nearby_text.push(d.label);
                    }
                    match &mut last.grouping {
                        FieldGrouping::CheckboxGroup { members } => members.push(member),
                        other => {
                            *other = FieldGrouping::CheckboxGroup {
                                members: vec![first, member],
                            }
                        }
                    }
                } else {
                    entries.push(FieldEntry {
                        descriptor: d,
                        grouping: FieldGrouping::Single,
                    });
                }
                checkbox_tail = Some(top);
            }
            _ => {
                entries.push(FieldEntry {
                    descriptor: d,
                    grouping: FieldGrouping::Single,
                });
                checkbox_tail = None;
            }
        }
    }

    entries
}

fn top_of(snapshot: &PageSnapshot, id: ElementId) -> f32 {
    snapshot.element(id).map(|e| e.top_px).unwrap_or(0.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCandidate {
    pub element: ElementId,
    pub text: String,
    pub level: u8,
    pub top_px: f32,
}

pub struct SectionDetector {
    config: SectionConfig,
}

impl SectionDetector {
    pub fn new(config: SectionConfig) -> Self {
        Self { config }
    }

    /// Visual prominence of an element's text, 0..=8.
    pub fn prominence(&self, el: &Element) -> u32 {
        let s = &el.style;
        let mut score = 0;
        if s.font_size_px >= 20.0 {
            score += 3;
        } else if s.font_size_px >= 18.0 {
            score += 2;
        }
        if s.font_weight >= 600 {
            score += 2;
        }
        if s.margin_top_px + s.margin_bottom_px >= 16.0 {
            score += 1;
        }
        if s.uppercase {
            score += 1;
        }
        if s.block {
            score += 1;
        }
        score
    }

    /// Pass 1a: heading-like elements in document order.
    pub fn candidates(&self, snapshot: &PageSnapshot) -> Vec<HeaderCandidate> {
        snapshot
            .elements
            .iter()
            .enumerate()
            .filter_map(|(i, el)| self.as_candidate(ElementId(i), el))
            .collect()
    }

    fn as_candidate(&self, id: ElementId, el: &Element) -> Option<HeaderCandidate> {
        if el.input.is_some() || el.tag == "label" {
            return None;
        }
        let text = el.text.trim();
        if text.is_empty() || text.chars().count() > self.config.max_header_len {
            return None;
        }
        let level = match el.heading_level() {
            Some(level) => level,
            None if self.prominence(el) >= self.config.prominence_threshold => {
                if el.style.font_size_px >= 24.0 {
                    1
                } else if el.style.font_size_px >= 20.0 {
                    2
                } else {
                    3
                }
            }
            None => return None,
        };
        Some(HeaderCandidate {
            element: id,
            text: text.to_string(),
            level,
            top_px: el.top_px,
        })
    }

    /// Pass 1b: keep candidates followed by enough nearby fields.
    pub fn validate(
        &self,
        snapshot: &PageSnapshot,
        candidates: &[HeaderCandidate],
        fields: &[FieldClassification],
    ) -> Vec<HeaderCandidate> {
        let mut positions: Vec<(usize, f32)> = fields
            .iter()
            .map(|f| (f.field.element.0, top_of(snapshot, f.field.element)))
            .collect();
        positions.sort_by_key(|(idx, _)| *idx);

        let mut validated = Vec::new();
        for (k, cand) in candidates.iter().enumerate() {
            let start = cand.element.0;
            let end = candidates
                .get(k + 1)
                .map(|next| next.element.0)
                .unwrap_or(usize::MAX);

            let mut anchor_idx = start;
            let mut anchor_top = cand.top_px;
            let mut found = 0usize;
            for &(idx, top) in positions.iter().filter(|(idx, _)| *idx > start && *idx < end) {
                if idx - anchor_idx > self.config.max_dom_gap
                    || top - anchor_top > self.config.max_gap_px
                {
                    break;
                }
                found += 1;
                if found >= self.config.min_fields {
                    break;
                }
                anchor_idx = idx;
                anchor_top = top;
            }

            if found >= self.config.min_fields {
                validated.push(cand.clone());
            } else {
                debug!(header = %cand.text, fields = found, "rejected section header candidate");
            }
        }
        validated
    }

    /// Group classified fields into sections, in document order.
    pub fn detect(&self, snapshot: &PageSnapshot, mut fields: Vec<FieldClassification>) -> Vec<Section> {
        fields.sort_by_key(|f| f.field.element);
        let candidates = self.candidates(snapshot);
        let headers = self.validate(snapshot, &candidates, &fields);

        let mut sections = Vec::new();
        let mut current = Section::ungrouped();
        let mut next_header = headers.iter().peekable();

        for field in fields {
            while let Some(h) = next_header.next_if(|h| h.element < field.field.element) {
                let finished = std::mem::replace(
                    &mut current,
                    Section {
                        title: Some(h.text.clone()),
                        level: h.level,
                        fields: Vec::new(),
                    },
                );
                if !finished.fields.is_empty() {
                    sections.push(finished);
                }
            }
            current.fields.push(field);
        }
        if !current.fields.is_empty() {
            sections.push(current);
        }
        sections
    }
}
