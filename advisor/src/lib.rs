//! From a Market State to ranked, sized trade setups.
//!
//! Pipeline: [`prompt`] renders the request, a [`backend::ModelBackend`]
//! answers it, [`validator`] runs the bounded retry state machine over the
//! answers, [`ranker`] orders what survived and [`sizing`] annotates each
//! setup with a position plan. [`run`] ties it to a snapshot store.

pub mod backend;
pub mod confidence;
pub mod error;
pub mod prompt;
pub mod ranker;
pub mod run;
pub mod sizing;
pub mod validator;

pub use backend::{BackendError, ModelBackend};
pub use confidence::{ConfidenceWeights, WeightsError};
pub use error::{ResponseFailure, SchemaViolation};
pub use prompt::{ModelRequest, PromptComposer, SamplingParams};
pub use ranker::SetupRanker;
pub use run::{AnalysisConfig, AnalysisMode, AnalysisOutcome, AnalysisReport, AnalysisRun, RunError, WindowSettings};
pub use sizing::PositionSizer;
pub use validator::{Phase, ResponseValidator, RetryPolicy, ValidatedBatch, ValidationOutcome, ValidationRun};
