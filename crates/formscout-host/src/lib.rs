//! Page-instance runtime: runs detection cycles through the settle window,
//! publishes results over the resilient channel, and owns the lifecycle of
//! every per-instance record.

mod error;

pub mod agent;
pub mod orchestrator;
pub mod reporter;
pub mod source;
pub mod store;

pub use agent::{AgentEvent, AgentHandle, AgentStatus, PageAgent};
pub use error::{AgentError, SnapshotError};
pub use orchestrator::{AttemptOutcome, CandidateOutcome, DetectionPhase, Orchestrator};
pub use reporter::{ErrorRecord, ErrorReporter};
pub use source::{MemorySource, PageSource};
pub use store::{InstanceStore, PageContext};
