//! High-level RAG service.
//!
//! Bundles the vector store, embedding generator, retriever, and workflow
//! behind one API: knowledge-base seeding and case logging, categorical
//! and semantic search, and RAG-enhanced analysis.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::core::config::RagSettings;
use crate::core::errors::RagError;
use crate::embeddings::EmbeddingGenerator;
use crate::generation::AnalysisProvider;
use crate::retrieval::{RetrievalResult, Retriever};
use crate::seeds::SeedData;
use crate::store::{Filter, Metadata, VectorStore};
use crate::workflow::{AnalysisState, AnalysisType, AnalysisWorkflow, StageContext};

/// Collection holding all knowledge entries.
pub const KNOWLEDGE_BASE: &str = "knowledge_base";

/// Result cap for categorical (metadata-only) lookups.
const CATEGORY_RESULTS: usize = 10;

/// One RAG-enhanced analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub description: String,
    pub plant_type: Option<String>,
    pub severity_level: Option<String>,
    pub analysis_type: AnalysisType,
}

impl AnalysisRequest {
    pub fn symptoms(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            plant_type: None,
            severity_level: None,
            analysis_type: AnalysisType::Symptoms,
        }
    }

    pub fn with_plant_type(mut self, plant_type: impl Into<String>) -> Self {
        self.plant_type = Some(plant_type.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity_level = Some(severity.into());
        self
    }
}

/// A resolved analysis case logged back into the knowledge base.
#[derive(Debug, Clone)]
pub struct AnalysisCase {
    pub disease: String,
    pub plant: String,
    pub symptoms: String,
    pub treatment_used: String,
    pub effectiveness: String,
    pub severity: String,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBaseStats {
    pub total_documents: usize,
    pub collection: String,
    pub metadata: Metadata,
}

pub struct RagService {
    store: Arc<VectorStore>,
    embeddings: Arc<EmbeddingGenerator>,
    retriever: Arc<Retriever>,
    analyzer: Arc<dyn AnalysisProvider>,
    settings: Arc<RagSettings>,
    workflow: AnalysisWorkflow,
}

impl RagService {
    pub fn new(
        store: Arc<VectorStore>,
        embeddings: Arc<EmbeddingGenerator>,
        analyzer: Arc<dyn AnalysisProvider>,
        settings: Arc<RagSettings>,
    ) -> Self {
        let retriever = Arc::new(Retriever::new(store.clone(), embeddings.clone()));
        Self {
            store,
            embeddings,
            retriever,
            analyzer,
            settings,
            workflow: AnalysisWorkflow::new(),
        }
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    /// Seed the knowledge base with diseases, treatments, and care guides.
    ///
    /// Entries are embedded in document mode as one batch and upserted, so
    /// re-seeding the same corpus replaces rather than duplicates.
    pub async fn seed_knowledge_base(&self, data: &SeedData) -> Result<usize, RagError> {
        tracing::info!("Seeding knowledge base...");

        let mut documents = Vec::with_capacity(data.len());
        let mut ids = Vec::with_capacity(data.len());
        let mut metadatas = Vec::with_capacity(data.len());

        for disease in &data.diseases {
            ids.push(format!("disease_{}", disease.id));
            documents.push(disease.description.clone());
            let mut metadata = Metadata::new();
            metadata.insert("type".to_string(), json!("disease"));
            metadata.insert("name".to_string(), json!(disease.name));
            metadata.insert("plant".to_string(), json!(disease.plant));
            metadata.insert("severity".to_string(), json!(disease.severity));
            metadata.insert("symptoms".to_string(), json!(disease.symptoms));
            metadatas.push(metadata);
        }

        for treatment in &data.treatments {
            ids.push(format!("treatment_{}", treatment.id));
            documents.push(treatment.description.clone());
            let mut metadata = Metadata::new();
            metadata.insert("type".to_string(), json!("treatment"));
            metadata.insert("disease".to_string(), json!(treatment.disease));
            metadata.insert("method".to_string(), json!(treatment.method));
            metadata.insert(
                "effectiveness".to_string(),
                json!(treatment.effectiveness),
            );
            metadata.insert("organic".to_string(), json!(treatment.organic));
            metadatas.push(metadata);
        }

        for guide in &data.care_guides {
            ids.push(format!("care_{}", guide.id));
            documents.push(guide.description.clone());
            let mut metadata = Metadata::new();
            metadata.insert("type".to_string(), json!("care"));
            metadata.insert("plant".to_string(), json!(guide.plant));
            metadata.insert("difficulty".to_string(), json!(guide.difficulty));
            metadata.insert("season".to_string(), json!(guide.season));
            metadatas.push(metadata);
        }

        if documents.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embeddings.embed_documents(&documents).await;
        let count = documents.len();
        self.store
            .add(
                KNOWLEDGE_BASE,
                documents,
                metadatas,
                Some(embeddings),
                Some(ids),
            )
            .await?;

        tracing::info!("Seeded {} documents into knowledge base", count);
        Ok(count)
    }

    /// Log a resolved analysis case back into the knowledge base.
    ///
    /// The entry is keyed by disease/plant/severity, so logging the same
    /// case again updates it in place.
    pub async fn add_analysis_case(&self, case: &AnalysisCase) -> Result<(), RagError> {
        let content = format!(
            "Case: {} on {}. Symptoms: {}. Treatment: {} (Effectiveness: {})",
            case.disease, case.plant, case.symptoms, case.treatment_used, case.effectiveness
        );

        let embedding = self.embeddings.embed_document(&content).await?;

        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), json!("case"));
        metadata.insert("disease".to_string(), json!(case.disease));
        metadata.insert("plant".to_string(), json!(case.plant));
        metadata.insert("treatment".to_string(), json!(case.treatment_used));
        metadata.insert("effectiveness".to_string(), json!(case.effectiveness));
        metadata.insert("severity".to_string(), json!(case.severity));
        metadata.insert(
            "logged_at".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );

        let id = format!("case_{}_{}_{}", case.disease, case.plant, case.severity);
        self.store
            .add(
                KNOWLEDGE_BASE,
                vec![content],
                vec![metadata],
                Some(vec![embedding]),
                Some(vec![id]),
            )
            .await?;

        tracing::info!("Added case: {} on {}", case.disease, case.plant);
        Ok(())
    }

    /// Search the knowledge base, semantically or within a filter.
    pub async fn search_knowledge_base(
        &self,
        query: &str,
        top_k: usize,
        filters: Option<&Filter>,
    ) -> Vec<RetrievalResult> {
        match filters {
            Some(filter) => {
                self.retriever
                    .retrieve_by_filter(query, KNOWLEDGE_BASE, filter, top_k)
                    .await
            }
            None => {
                self.retriever
                    .retrieve(query, KNOWLEDGE_BASE, top_k, self.settings.min_similarity)
                    .await
            }
        }
    }

    /// All diseases recorded for a plant.
    pub async fn search_diseases(&self, plant: &str) -> Vec<RetrievalResult> {
        let filter = Filter::new().eq("type", "disease").eq("plant", plant);
        self.retriever
            .retrieve_by_metadata(&filter, KNOWLEDGE_BASE, CATEGORY_RESULTS)
            .await
    }

    /// All treatments recorded for a disease.
    pub async fn search_treatments(&self, disease: &str) -> Vec<RetrievalResult> {
        let filter = Filter::new().eq("type", "treatment").eq("disease", disease);
        self.retriever
            .retrieve_by_metadata(&filter, KNOWLEDGE_BASE, CATEGORY_RESULTS)
            .await
    }

    /// All care guides recorded for a plant.
    pub async fn search_care_guides(&self, plant: &str) -> Vec<RetrievalResult> {
        let filter = Filter::new().eq("type", "care").eq("plant", plant);
        self.retriever
            .retrieve_by_metadata(&filter, KNOWLEDGE_BASE, CATEGORY_RESULTS)
            .await
    }

    /// Run the RAG-enhanced analysis workflow for one request.
    ///
    /// Always produces a response object; degraded runs carry only the
    /// workflow annotations.
    pub async fn analyze_with_rag(&self, request: AnalysisRequest) -> Result<Value, RagError> {
        tracing::info!(
            "Starting RAG-enhanced analysis: {}",
            request.analysis_type.as_str()
        );

        let mut state = AnalysisState::new(
            request.description,
            request.plant_type,
            request.severity_level,
            request.analysis_type,
        );

        let ctx = StageContext {
            retriever: self.retriever.clone(),
            analyzer: self.analyzer.clone(),
            settings: self.settings.clone(),
        };
        self.workflow.execute(&mut state, &ctx).await?;

        Ok(state.final_response.unwrap_or_else(|| json!({})))
    }

    pub async fn kb_stats(&self) -> Result<KnowledgeBaseStats, RagError> {
        let stats = self.store.stats(KNOWLEDGE_BASE).await?;
        Ok(KnowledgeBaseStats {
            total_documents: stats.count,
            collection: stats.name,
            metadata: stats.metadata,
        })
    }

    pub async fn clear_knowledge_base(&self) -> Result<(), RagError> {
        self.store.delete_collection(KNOWLEDGE_BASE).await?;
        tracing::info!("Knowledge base cleared");
        Ok(())
    }
}
