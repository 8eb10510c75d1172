//! The five pipeline stages.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::service::KNOWLEDGE_BASE;

use super::runtime::{Stage, StageContext, StageError};
use super::state::{AnalysisState, AnalysisType, ContextDecision};

/// Number of characters of context echoed into the final response.
const CONTEXT_SUMMARY_CHARS: usize = 500;

/// Stage 1: retrieve relevant entries from the knowledge base.
pub struct RetrieveContextStage;

#[async_trait]
impl Stage for RetrieveContextStage {
    fn id(&self) -> &'static str {
        "retrieve_context"
    }

    async fn run(&self, state: &mut AnalysisState, ctx: &StageContext) -> Result<(), StageError> {
        let mut query_parts = vec![state.description.clone()];
        if let Some(plant) = &state.plant_type {
            query_parts.push(format!("plant: {plant}"));
        }
        if let Some(severity) = &state.severity_level {
            query_parts.push(format!("severity: {severity}"));
        }
        let query = query_parts.join(" ");

        let results = ctx
            .retriever
            .retrieve(
                &query,
                KNOWLEDGE_BASE,
                ctx.settings.top_k,
                ctx.settings.min_similarity,
            )
            .await;

        tracing::debug!("Retrieved {} documents", results.len());
        state.rag_context = ctx.retriever.format_context(&results);
        state.retrieved_documents = results;

        Ok(())
    }
}

/// Stage 2: score retrieval quality as the mean similarity.
pub struct ValidateRetrievalStage;

#[async_trait]
impl Stage for ValidateRetrievalStage {
    fn id(&self) -> &'static str {
        "validate_retrieval"
    }

    async fn run(&self, state: &mut AnalysisState, _ctx: &StageContext) -> Result<(), StageError> {
        if state.retrieved_documents.is_empty() {
            tracing::warn!("No documents retrieved");
            state.confidence = 0.0;
            return Ok(());
        }

        let total: f64 = state
            .retrieved_documents
            .iter()
            .map(|doc| doc.similarity_score)
            .sum();
        state.confidence = total / state.retrieved_documents.len() as f64;

        tracing::debug!("Retrieval confidence: {:.2}", state.confidence);
        Ok(())
    }
}

/// Stage 3: decide whether the retrieved context is trusted.
///
/// Both outcomes currently lead to generation; the decision stays a
/// distinct evaluated condition so the paths can diverge later.
pub struct DecideContextStage;

#[async_trait]
impl Stage for DecideContextStage {
    fn id(&self) -> &'static str {
        "decide_context"
    }

    async fn run(&self, state: &mut AnalysisState, ctx: &StageContext) -> Result<(), StageError> {
        let decision = if state.confidence >= ctx.settings.confidence_threshold {
            ContextDecision::ContextTrusted
        } else {
            ContextDecision::ContextLow
        };

        tracing::debug!("Context decision: {:?}", decision);
        state.decision = Some(decision);
        Ok(())
    }
}

/// Stage 4: invoke the generation collaborator.
///
/// Only symptom analyses generate here; image analysis happens upstream of
/// the pipeline. A collaborator failure is caught and leaves
/// `initial_analysis` unset rather than aborting the run.
pub struct GenerateAnalysisStage;

#[async_trait]
impl Stage for GenerateAnalysisStage {
    fn id(&self) -> &'static str {
        "generate_analysis"
    }

    async fn run(&self, state: &mut AnalysisState, ctx: &StageContext) -> Result<(), StageError> {
        if state.analysis_type != AnalysisType::Symptoms {
            tracing::debug!(
                "Generation skipped for analysis type '{}'",
                state.analysis_type.as_str()
            );
            return Ok(());
        }

        let context = if state.rag_context.is_empty() {
            None
        } else {
            Some(state.rag_context.as_str())
        };

        match ctx
            .analyzer
            .analyze(&state.description, state.plant_type.as_deref(), context)
            .await
        {
            Ok(analysis) => {
                tracing::debug!("Analysis generated");
                state.initial_analysis = Some(analysis);
            }
            Err(err) => {
                tracing::warn!("Analysis generation failed: {}", err);
                state.initial_analysis = None;
            }
        }

        Ok(())
    }
}

/// Stage 5: enhance the analysis with retrieval annotations and finalize.
pub struct FinalizeResponseStage;

#[async_trait]
impl Stage for FinalizeResponseStage {
    fn id(&self) -> &'static str {
        "finalize_response"
    }

    async fn run(&self, state: &mut AnalysisState, _ctx: &StageContext) -> Result<(), StageError> {
        let mut response = match &state.initial_analysis {
            Some(analysis) if analysis.is_object() => analysis.clone(),
            Some(analysis) => json!({ "analysis": analysis.clone() }),
            None => json!({}),
        };

        // Always an object by construction above.
        let obj = response.as_object_mut().expect("response is an object");

        if state.initial_analysis.is_some() {
            if state.retrieved_documents.is_empty() {
                obj.insert("rag_enhanced".to_string(), Value::Bool(false));
            } else {
                obj.insert("rag_enhanced".to_string(), Value::Bool(true));
                obj.insert(
                    "referenced_cases".to_string(),
                    json!(state.retrieved_documents.len()),
                );
                let summary: String = state.rag_context.chars().take(CONTEXT_SUMMARY_CHARS).collect();
                obj.insert("context_used".to_string(), Value::String(summary));
            }
        }

        obj.insert(
            "workflow_info".to_string(),
            json!({
                "rag_retrieval_count": state.retrieved_documents.len(),
                "rag_confidence": state.confidence,
                "workflow_completed": true,
            }),
        );

        state.final_response = Some(response);
        tracing::debug!("Workflow finalized");
        Ok(())
    }
}
