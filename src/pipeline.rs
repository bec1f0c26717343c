use std::sync::Arc;

use anyhow::Result;
use log::{debug, info};

use crate::config::Config;
use crate::model::{CompletionModel, Embedder, OpenAiClient, TextStream};
use crate::query::{LlmQueryConstructor, PineconeTranslator, QueryConstructor};
use crate::schema::MetadataSchema;
use crate::store::{Document, PineconeIndex, VectorStore};

pub const SYSTEM_PROMPT: &str = "You are an assistant designed to retrieve information about jazz musicians from a database. Your name is Charlie.
You are capable of answering all types of questions, but you typically deal with database queries.
You can retrieve context from the database to answer questions. When you receive context, always output the context and answer the question. 
Use the following pieces of retrieved context to answer the question.
If you don't know the answer, just say that you don't know, and make sure to state your purpose as an assistant. Help the user out when you can by telling them what you are capable, and offering suggestions of what they might look up.
Always type in lowercase, using slang as if you are GenZ.
Use three sentences maximum and keep the answer concise.";

/// Joins retrieved documents into the context block of the system prompt.
pub fn format_documents(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|doc| doc.page_content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Renders the system and human turns into the single completion prompt.
pub fn compose_prompt(context: &str, question: &str) -> String {
    format!("System: {SYSTEM_PROMPT}\n\n{context}\nHuman: {question}")
}

/// Self-querying retrieval followed by a streamed completion. Single turn: no
/// conversation history is kept or sent.
pub struct RagPipeline {
    query_constructor: Arc<dyn QueryConstructor>,
    translator: PineconeTranslator,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn CompletionModel>,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(
        query_constructor: Arc<dyn QueryConstructor>,
        translator: PineconeTranslator,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn CompletionModel>,
        top_k: usize,
    ) -> Self {
        Self {
            query_constructor,
            translator,
            embedder,
            store,
            llm,
            top_k,
        }
    }

    /// Wires the OpenAI and Pinecone clients described by `config`. Fails if the
    /// schema is invalid or the index cannot be opened.
    pub async fn from_config(config: &Config, schema: MetadataSchema) -> Result<Self> {
        schema.validate()?;

        let openai = Arc::new(OpenAiClient::new(&config.openai));
        let index = PineconeIndex::connect(&config.pinecone).await?;
        let query_constructor = LlmQueryConstructor::new(openai.clone(), schema.clone());

        Ok(Self::new(
            Arc::new(query_constructor),
            PineconeTranslator::new(schema),
            openai.clone(),
            Arc::new(index),
            openai,
            config.top_k,
        ))
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<Document>> {
        let structured = self.query_constructor.construct(question).await?;
        let filter = match &structured.filter {
            Some(filter) => self.translator.translate(filter)?,
            None => None,
        };
        info!(
            "Structured query {:?} with filter {}",
            structured.query,
            filter
                .as_ref()
                .map(|f| f.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let vector = self.embedder.embed(&structured.query).await?;
        let documents = self
            .store
            .similarity_search(vector, self.top_k, filter)
            .await?;
        info!("Retrieved {} documents", documents.len());
        Ok(documents)
    }

    pub async fn prompt_for(&self, question: &str) -> Result<String> {
        let documents = self.retrieve(question).await?;
        Ok(compose_prompt(&format_documents(&documents), question))
    }

    pub async fn stream(&self, question: &str) -> Result<TextStream> {
        let prompt = self.prompt_for(question).await?;
        debug!("Completion prompt: {}", prompt);
        self.llm.stream(&prompt).await
    }
}
