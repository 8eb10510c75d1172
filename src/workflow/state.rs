//! Analysis state threaded through the pipeline.

use serde_json::{json, Value};

use crate::retrieval::RetrievalResult;

/// What kind of analysis the caller requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    /// An image was analyzed upstream; the pipeline only annotates.
    Image,
    /// Free-text symptom description, analyzed with retrieved context.
    Symptoms,
    /// Care guidance request.
    Care,
}

impl AnalysisType {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "symptoms" => AnalysisType::Symptoms,
            "care" => AnalysisType::Care,
            _ => AnalysisType::Image,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Image => "image",
            AnalysisType::Symptoms => "symptoms",
            AnalysisType::Care => "care",
        }
    }
}

/// Outcome of the context-trust decision. Both variants currently proceed
/// to generation; the decision is kept explicit so the paths can diverge
/// later without restructuring the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextDecision {
    ContextTrusted,
    ContextLow,
}

/// Mutable record owned by exactly one pipeline run.
#[derive(Debug, Clone)]
pub struct AnalysisState {
    pub analysis_id: String,

    // Input
    pub description: String,
    pub plant_type: Option<String>,
    pub severity_level: Option<String>,
    pub analysis_type: AnalysisType,

    // Working state
    pub retrieved_documents: Vec<RetrievalResult>,
    pub rag_context: String,
    pub confidence: f64,
    pub decision: Option<ContextDecision>,

    // Output
    pub initial_analysis: Option<Value>,
    pub final_response: Option<Value>,
}

impl AnalysisState {
    pub fn new(
        description: impl Into<String>,
        plant_type: Option<String>,
        severity_level: Option<String>,
        analysis_type: AnalysisType,
    ) -> Self {
        Self {
            analysis_id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            plant_type,
            severity_level,
            analysis_type,
            retrieved_documents: Vec::new(),
            rag_context: String::new(),
            confidence: 0.0,
            decision: None,
            initial_analysis: None,
            final_response: None,
        }
    }

    /// Compact view for logging.
    pub fn summary(&self) -> Value {
        json!({
            "analysis_id": self.analysis_id,
            "analysis_type": self.analysis_type.as_str(),
            "retrieved_documents": self.retrieved_documents.len(),
            "rag_context_length": self.rag_context.len(),
            "confidence": self.confidence,
            "has_final_response": self.final_response.is_some(),
        })
    }
}
