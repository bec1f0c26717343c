pub mod pinecone;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use pinecone::PineconeIndex;

/// Metadata key holding a document's text.
pub const TEXT_KEY: &str = "text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: &str) -> Self {
        Self {
            page_content: page_content.to_string(),
            metadata: Map::new(),
        }
    }

    /// Splits stored metadata into text and the remaining attributes.
    pub fn from_metadata(mut metadata: Map<String, Value>) -> Self {
        let page_content = match metadata.remove(TEXT_KEY) {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Self {
            page_content,
            metadata,
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Nearest documents to `vector`, optionally restricted by a metadata filter
    /// in the store's own dialect.
    async fn similarity_search(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<Document>>;
}
