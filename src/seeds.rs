//! Seed data for the knowledge base.
//!
//! The seed format is a mapping with three sequences — diseases,
//! treatments, and care guides — used only to populate the store. The
//! built-in corpus ships with the crate as `data/knowledge_seed.json`.

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

const BUILTIN_SEED: &str = include_str!("../data/knowledge_seed.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseSeed {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub plant: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub symptoms: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentSeed {
    pub id: String,
    #[serde(default)]
    pub disease: String,
    #[serde(default)]
    pub method: String,
    pub description: String,
    #[serde(default)]
    pub effectiveness: String,
    #[serde(default)]
    pub organic: bool,
    #[serde(default)]
    pub application_rate: String,
    #[serde(default)]
    pub frequency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareGuideSeed {
    pub id: String,
    #[serde(default)]
    pub plant: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub season: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub diseases: Vec<DiseaseSeed>,
    #[serde(default)]
    pub treatments: Vec<TreatmentSeed>,
    #[serde(default)]
    pub care_guides: Vec<CareGuideSeed>,
}

impl SeedData {
    /// The corpus bundled with the crate.
    pub fn builtin() -> Result<SeedData, RagError> {
        serde_json::from_str(BUILTIN_SEED).map_err(RagError::internal)
    }

    pub fn from_json(json: &str) -> Result<SeedData, RagError> {
        serde_json::from_str(json).map_err(|err| RagError::BadRequest(err.to_string()))
    }

    pub fn len(&self) -> usize {
        self.diseases.len() + self.treatments.len() + self.care_guides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_seed_parses() {
        let seed = SeedData::builtin().unwrap();
        assert_eq!(seed.diseases.len(), 5);
        assert_eq!(seed.treatments.len(), 5);
        assert_eq!(seed.care_guides.len(), 4);
        assert_eq!(seed.len(), 14);
    }

    #[test]
    fn builtin_seed_entries_have_content() {
        let seed = SeedData::builtin().unwrap();
        assert!(seed
            .diseases
            .iter()
            .all(|d| !d.id.is_empty() && !d.description.is_empty()));
        assert!(seed
            .treatments
            .iter()
            .all(|t| !t.id.is_empty() && !t.description.is_empty()));
        assert!(seed
            .care_guides
            .iter()
            .all(|c| !c.id.is_empty() && !c.description.is_empty()));
    }

    #[test]
    fn from_json_accepts_partial_mapping() {
        let seed = SeedData::from_json(r#"{"diseases": []}"#).unwrap();
        assert!(seed.is_empty());

        let seed = SeedData::from_json(
            r#"{"treatments": [{"id": "t1", "description": "apply weekly"}]}"#,
        )
        .unwrap();
        assert_eq!(seed.treatments.len(), 1);
        assert!(!seed.treatments[0].organic);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        assert!(SeedData::from_json("not json").is_err());
    }
}
