pub mod openai;
pub mod sse;

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::Stream;

pub use openai::OpenAiClient;

/// Completion text as it is generated, in emission order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Waits for the whole completion.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Starts a streamed completion. Errors before the first token are returned
    /// here; later ones arrive through the stream.
    async fn stream(&self, prompt: &str) -> Result<TextStream>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
