//! Core types exchanged with the cooking assistant backend

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Routing analysis the assistant attaches to an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    /// Retrieval strategy chosen by the router (e.g. "graph", "hybrid")
    pub strategy: String,
    /// Query complexity, always within [0, 1]
    #[serde(deserialize_with = "unit_interval")]
    pub complexity: f64,
    /// How relationship-heavy the query is, when the router reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_intensity: Option<f64>,
    /// Free-form routing explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Documents the answer draws on, in relevance order
    #[serde(default, alias = "relevant_docs", alias = "relevantDocuments")]
    pub relevant_documents: Vec<RelevantDocument>,
}

/// A document matched during retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantDocument {
    #[serde(default)]
    pub name: String,
    /// Search type that surfaced the document
    #[serde(default, alias = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

fn unit_interval<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.clamp(0.0, 1.0))
}

/// Bearer credential issued by the login endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Body of a chat request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub question: String,
    pub stream: bool,
}

impl ChatRequest {
    pub fn streaming(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            stream: true,
        }
    }

    pub fn blocking(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            stream: false,
        }
    }
}

/// Non-streaming chat answer
#[derive(Debug, Clone, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    /// The blocking endpoint reports analysis without documents, and may
    /// send an empty object when routing was skipped
    #[serde(default)]
    pub analysis: serde_json::Value,
}

impl ChatAnswer {
    /// Typed view of the analysis, when it carries a strategy
    pub fn analysis(&self) -> Option<AnalysisPayload> {
        serde_json::from_value(self.analysis.clone()).ok()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: String,
}

/// Aggregate counters shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemStats {
    pub total_recipes: u64,
    pub total_ingredients: u64,
    pub total_documents: u64,
    pub vector_indices: u64,
    pub total_queries: u64,
}

/// Filters for the recipe listing
#[derive(Debug, Clone, Default)]
pub struct RecipeQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub favorites_only: bool,
}

impl RecipeQuery {
    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(category) = self.category.as_deref().filter(|c| *c != "all") {
            params.push(("category", category.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        if self.favorites_only {
            params.push(("favorite", "true".to_string()));
        }
        params
    }
}

/// Recipe as listed in the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeSummary {
    pub id: serde_json::Value,
    pub name: String,
    pub description: Option<String>,
    pub difficulty: Option<String>,
    pub time: Option<String>,
    pub calories: Option<serde_json::Value>,
    pub likes: Option<u64>,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub favorite: bool,
}

/// Full recipe with ingredients and steps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub summary: RecipeSummary,
    pub servings: Option<serde_json::Value>,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ingredient {
    pub name: String,
    pub amount: String,
}
