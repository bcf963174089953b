//! Page snapshot: the element tree of an analysed page, flattened into
//! document order.
//!
//! Snapshots are plain data. Elements are addressed by their index
//! ([`ElementId`]), so nothing here holds a reference into a live document.

use serde::{Deserialize, Serialize};

use crate::model::{ElementId, FieldDescriptor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// One element of the flattened tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Lowercase tag name (`h2`, `div`, `input`, ...).
    pub tag: String,
    /// Own visible text, whitespace-trimmed.
    #[serde(default)]
    pub text: String,
    /// Vertical offset from the top of the document.
    #[serde(default)]
    pub top_px: f32,
    #[serde(default)]
    pub style: Style,
    /// Present for form controls.
    #[serde(default)]
    pub input: Option<InputAttrs>,
}

/// The computed-style subset used for prominence scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default = "default_font_size")]
    pub font_size_px: f32,
    #[serde(default = "default_font_weight")]
    pub font_weight: u16,
    #[serde(default)]
    pub margin_top_px: f32,
    #[serde(default)]
    pub margin_bottom_px: f32,
    /// `text-transform: uppercase`.
    #[serde(default)]
    pub uppercase: bool,
    /// Block-level display.
    #[serde(default)]
    pub block: bool,
}

fn default_font_size() -> f32 {
    16.0
}

fn default_font_weight() -> u16 {
    400
}

impl Default for Style {
    fn default() -> Self {
        Self {
            font_size_px: default_font_size(),
            font_weight: default_font_weight(),
            margin_top_px: 0.0,
            margin_bottom_px: 0.0,
            uppercase: false,
            block: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    #[default]
    Text,
    Email,
    Tel,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
    Textarea,
    Password,
    Hidden,
    File,
    Submit,
    Button,
    Other,
}

impl InputKind {
    /// Whether the control can carry business data worth classifying.
    pub fn is_candidate(&self) -> bool {
        !matches!(
            self,
            Self::Hidden | Self::Submit | Self::Button | Self::Password
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Tel => "tel",
            Self::Number => "number",
            Self::Date => "date",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Textarea => "textarea",
            Self::Password => "password",
            Self::Hidden => "hidden",
            Self::File => "file",
            Self::Submit => "submit",
            Self::Button => "button",
            Self::Other => "other",
        }
    }
}

/// Attributes of a form control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InputAttrs {
    #[serde(default)]
    pub kind: InputKind,
    /// `name` attribute; radio buttons sharing it form one group.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub html_id: String,
    /// Text of the associated `<label>`.
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub placeholder: String,
    /// Free text found near the control (help text, table cells, ...).
    #[serde(default)]
    pub nearby_text: Vec<String>,
}

impl Element {
    /// Heading level for semantic heading elements.
    pub fn heading_level(&self) -> Option<u8> {
        match self.tag.as_str() {
            "h1" => Some(1),
            "h2" => Some(2),
            "h3" => Some(3),
            "h4" => Some(4),
            "h5" => Some(5),
            "h6" => Some(6),
            "legend" => Some(2),
            _ => None,
        }
    }

    /// A form control worth classifying.
    pub fn candidate_input(&self) -> Option<&InputAttrs> {
        self.input.as_ref().filter(|i| i.kind.is_candidate())
    }
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            url: url.into(),
            elements,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    /// Descriptors for every candidate input, in document order.
    pub fn field_descriptors(&self) -> Vec<FieldDescriptor> {
        self.elements
            .iter()
            .enumerate()
            .filter_map(|(i, el)| {
                el.candidate_input()
                    .map(|input| FieldDescriptor::from_input(ElementId(i), input))
            })
            .collect()
    }
}

impl FieldDescriptor {
    pub fn from_input(element: ElementId, input: &InputAttrs) -> Self {
        Self {
            element,
            kind: input.kind,
            name: input.name.clone(),
            html_id: input.html_id.clone(),
            label: input.label.trim().to_string(),
            placeholder: input.placeholder.trim().to_string(),
            nearby_text: input.nearby_text.clone(),
        }
    }
}
