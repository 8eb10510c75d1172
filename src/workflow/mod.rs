//! RAG-enhanced analysis pipeline.
//!
//! A fixed five-stage workflow over one `AnalysisState` per run:
//! retrieve -> validate -> decide -> generate -> finalize.

pub mod runtime;
pub mod stages;
pub mod state;

pub use runtime::{AnalysisWorkflow, Stage, StageContext, StageError};
pub use state::{AnalysisState, AnalysisType, ContextDecision};
