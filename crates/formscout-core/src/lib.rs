pub mod config;
pub mod message;
pub mod model;
pub mod page;
pub mod schema;

pub use config::{
    AppConfig, ChannelConfig, ConfigError, DetectionConfig, RetryPolicy, ScoringWeights,
    SectionConfig,
};
pub use message::{Direction, Envelope, Message, ProgressPhase, Severity};
pub use model::{
    CachedResult, DetectionErrorReport, DetectionResult, ElementId, FieldCategory,
    FieldClassification, FieldDescriptor, FieldGrouping, Jurisdiction, PageInstanceId, Section,
};
pub use page::{Element, InputAttrs, InputKind, PageSnapshot, Style};
pub use schema::fields;
