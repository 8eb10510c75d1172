//! RAG-enhanced plant analysis core.
//!
//! A vector-backed knowledge store, an asymmetric embedding layer, a
//! semantic retriever with quality scoring, and a staged workflow that
//! decides whether to trust retrieved context before handing it to the
//! generation collaborator.

pub mod core;
pub mod embeddings;
pub mod generation;
pub mod logging;
pub mod retrieval;
pub mod seeds;
pub mod service;
pub mod state;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use crate::core::config::{AppPaths, RagSettings};
pub use crate::core::errors::RagError;
pub use crate::service::{AnalysisCase, AnalysisRequest, RagService, KNOWLEDGE_BASE};
pub use crate::state::AppState;
pub use crate::workflow::{AnalysisState, AnalysisType, ContextDecision};
