use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::sse::{SseDecoder, SseFrame};
use super::{CompletionModel, Embedder, TextStream};
use crate::config::OpenAiConfig;

/// Client for the OpenAI completions and embeddings endpoints.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    embedding_model: String,
    completion_model: String,
    temperature: f32,
    max_tokens: usize,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: usize,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Self {
        info!(
            "Using OpenAI at {} (completion: {}, embedding: {})",
            config.base_url, config.completion_model, config.embedding_model
        );

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            embedding_model: config.embedding_model.clone(),
            completion_model: config.completion_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: Client::new(),
        }
    }

    fn completion_request(&self, prompt: &str, stream: bool) -> reqwest::RequestBuilder {
        let payload = CompletionRequest {
            model: &self.completion_model,
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        };
        debug!("Completion payload: {:?}", payload);

        self.client
            .post(format!("{}/v1/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(anyhow!("OpenAI API error ({}): {}", status, error_text))
}

/// Extracts the text delta of one streamed completion event.
fn frame_text(frame: &SseFrame) -> Result<String> {
    let value: Value = serde_json::from_str(&frame.data)
        .map_err(|e| anyhow!("Malformed completion event {:?}: {}", frame.data, e))?;
    if let Some(error) = value.get("error") {
        return Err(anyhow!("OpenAI stream error: {}", error));
    }
    Ok(value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("text"))
        .and_then(|text| text.as_str())
        .unwrap_or_default()
        .to_string())
}

#[async_trait]
impl CompletionModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self.completion_request(prompt, false).send().await?;
        let body: CompletionResponse = check_status(response).await?.json().await?;

        let text = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| anyhow!("Completion response had no choices"))?;

        debug!("Completion length: {} characters", text.len());
        Ok(text)
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream> {
        let response = self
            .completion_request(prompt, true)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes_stream();

        struct State<S> {
            bytes: S,
            decoder: SseDecoder,
            pending: VecDeque<SseFrame>,
            done: bool,
        }

        let state = State {
            bytes: Box::pin(bytes),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let tokens = stream::unfold(state, |mut state| async move {
            loop {
                if state.done {
                    return None;
                }
                if let Some(frame) = state.pending.pop_front() {
                    if frame.is_done() {
                        return None;
                    }
                    match frame_text(&frame) {
                        Ok(text) if text.is_empty() => continue,
                        Ok(text) => return Some((Ok(text), state)),
                        Err(e) => {
                            state.done = true;
                            return Some((Err(e), state));
                        }
                    }
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => state.pending.extend(state.decoder.push(&chunk)),
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(anyhow!("Completion stream error: {}", e)), state));
                    }
                    None => match state.decoder.finish() {
                        Some(frame) => state.pending.push_back(frame),
                        None => {
                            warn!("Completion stream ended without [DONE]");
                            return None;
                        }
                    },
                }
            }
        });

        Ok(Box::pin(tokens))
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let payload = json!({
            "model": self.embedding_model,
            "input": text,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        let body: EmbeddingResponse = check_status(response).await?.json().await?;

        body.data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| anyhow!("Embedding response had no data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(&OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url: server.uri(),
            embedding_model: "text-embedding-3-small".to_string(),
            completion_model: "gpt-3.5-turbo-instruct".to_string(),
            temperature: 0.7,
            max_tokens: 256,
        })
    }

    fn sse_body(tokens: &[&str]) -> String {
        let mut body = String::new();
        for token in tokens {
            body.push_str(&format!(
                "data: {}\n\n",
                json!({ "choices": [{ "text": token, "index": 0 }] })
            ));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    #[tokio::test]
    async fn embed_returns_first_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(json!({
                "model": "text-embedding-3-small",
                "input": "drummer"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "embedding": [0.1, 0.2, 0.3], "index": 0 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vector = client_for(&server).embed("drummer").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn complete_returns_choice_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .and(body_partial_json(json!({ "stream": false, "prompt": "hi" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "text": "hello there", "index": 0 }]
            })))
            .mount(&server)
            .await;

        let text = client_for(&server).complete("hi").await.unwrap();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn stream_yields_tokens_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .and(body_partial_json(json!({ "stream": true })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body(&["yo", "", " sam", " plays", " drums"])),
            )
            .mount(&server)
            .await;

        let stream = client_for(&server).stream("who plays drums").await.unwrap();
        let tokens: Vec<String> = stream.try_collect().await.unwrap();
        assert_eq!(tokens, vec!["yo", " sam", " plays", " drums"]);
    }

    #[tokio::test]
    async fn http_errors_surface_before_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = match client_for(&server).stream("x").await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn error_events_become_stream_errors() {
        let frame = SseFrame {
            data: r#"{"error":{"message":"overloaded"}}"#.to_string(),
        };
        assert!(frame_text(&frame).is_err());
    }
}
