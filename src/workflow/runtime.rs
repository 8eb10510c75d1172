//! Stage trait and the fixed-sequence pipeline driver.
//!
//! The workflow is a finite ordered list of stages over one
//! `AnalysisState`; a small loop executes them strictly in order. No stage
//! is skipped, no stage is retried, and each stage is idempotent given the
//! same state.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::RagSettings;
use crate::core::errors::RagError;
use crate::generation::AnalysisProvider;
use crate::retrieval::Retriever;

use super::stages::{
    DecideContextStage, FinalizeResponseStage, GenerateAnalysisStage, RetrieveContextStage,
    ValidateRetrievalStage,
};
use super::state::AnalysisState;

/// Shared collaborators passed to stages during execution.
pub struct StageContext {
    pub retriever: Arc<Retriever>,
    pub analyzer: Arc<dyn AnalysisProvider>,
    pub settings: Arc<RagSettings>,
}

/// Error raised by a stage, tagged with the stage that failed.
#[derive(Debug, Clone)]
pub struct StageError {
    pub stage_id: String,
    pub message: String,
}

impl StageError {
    pub fn new(stage_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage {} failed: {}", self.stage_id, self.message)
    }
}

impl std::error::Error for StageError {}

impl From<StageError> for RagError {
    fn from(err: StageError) -> Self {
        RagError::Internal(err.to_string())
    }
}

/// One pipeline stage.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique identifier for this stage.
    fn id(&self) -> &'static str;

    /// Execute the stage logic.
    async fn run(&self, state: &mut AnalysisState, ctx: &StageContext) -> Result<(), StageError>;
}

/// The fixed five-stage analysis pipeline.
pub struct AnalysisWorkflow {
    stages: Vec<Box<dyn Stage>>,
}

impl AnalysisWorkflow {
    pub fn new() -> Self {
        Self {
            stages: vec![
                Box::new(RetrieveContextStage),
                Box::new(ValidateRetrievalStage),
                Box::new(DecideContextStage),
                Box::new(GenerateAnalysisStage),
                Box::new(FinalizeResponseStage),
            ],
        }
    }

    pub fn stage_ids(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.id()).collect()
    }

    /// Run every stage in order on the given state.
    pub async fn execute(
        &self,
        state: &mut AnalysisState,
        ctx: &StageContext,
    ) -> Result<(), StageError> {
        tracing::info!(
            "Starting analysis workflow: {} ({})",
            state.analysis_type.as_str(),
            state.analysis_id
        );

        for stage in &self.stages {
            tracing::debug!("Executing stage: {}", stage.id());
            stage.run(state, ctx).await?;
        }

        tracing::info!("Analysis workflow completed: {}", state.analysis_id);
        Ok(())
    }
}

impl Default for AnalysisWorkflow {
    fn default() -> Self {
        Self::new()
    }
}
