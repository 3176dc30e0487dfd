//! Teaching points and the teaching provider interface.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeachingPoint {
    pub id: String,
    #[serde(default)]
    pub related_question_id: Option<String>,
    pub topic: String,
    pub content: String,
    #[serde(default)]
    pub references: Vec<String>,
    pub difficulty_level: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// What the teaching provider is told about the question being taught.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeachingContext {
    pub case_id: String,
    pub category: String,
    pub question_text: String,
    pub answer_text: String,
    pub feedback: String,
    pub score: f64,
}

#[async_trait]
pub trait TeachingProvider: Send + Sync {
    async fn get_teaching_point(
        &self,
        question_id: &str,
        context: &TeachingContext,
    ) -> Result<TeachingPoint>;
}
