use std::io;

use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use futures_util::stream::{self, Stream, StreamExt};
use log::{error, info, warn};
use rand::seq::SliceRandom;
use serde_json::json;
use tera::Context;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

use crate::model::TextStream;
use crate::web::models::{CompletionRequest, ErrorResponse};
use crate::AppState;

pub const PLACEHOLDERS: [&str; 4] = [
    "what songs do sam and joe have in common?",
    "find me a drummer that knows 'anthropology'",
    "who knows the same songs as me?",
    "give me five trombone players in san mateo, ca",
];

// Index page handler
pub async fn index(data: web::Data<AppState>) -> impl Responder {
    let mut placeholders = PLACEHOLDERS.to_vec();
    placeholders.shuffle(&mut rand::thread_rng());

    let mut context = Context::new();
    context.insert("placeholders", &placeholders);

    match data.tera.render("index.html", &context) {
        Ok(html) => HttpResponse::Ok().content_type("text/html").body(html),
        Err(e) => {
            error!("Template error: {}", e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

fn error_response(status: StatusCode, message: String) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse { error: message })
}

// Completion endpoint: retrieval runs up front, then the answer is relayed as
// it is generated.
pub async fn completion(
    data: web::Data<AppState>,
    req: web::Json<CompletionRequest>,
) -> impl Responder {
    let request_id = Uuid::new_v4();
    let deadline = Instant::now() + data.max_duration;

    info!("[{}] Completion request: {}", request_id, req.prompt);

    let tokens = match timeout_at(deadline, data.pipeline.stream(&req.prompt)).await {
        Ok(Ok(tokens)) => tokens,
        Ok(Err(e)) => {
            error!("[{}] Pipeline error: {:#}", request_id, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to generate response: {}", e),
            );
        }
        Err(_) => {
            error!(
                "[{}] Gave up after {:?} before the answer started",
                request_id, data.max_duration
            );
            return error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "Timed out while generating response".to_string(),
            );
        }
    };

    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .streaming(relay(tokens, deadline, request_id))
}

/// Forwards completion chunks in order until the model finishes, fails, or the
/// request deadline passes. Any failure ends the body.
fn relay(
    tokens: TextStream,
    deadline: Instant,
    request_id: Uuid,
) -> impl Stream<Item = Result<web::Bytes, io::Error>> {
    stream::unfold(Some((tokens, 0usize)), move |state| async move {
        let (mut tokens, sent) = state?;
        match timeout_at(deadline, tokens.next()).await {
            Ok(Some(Ok(text))) => Some((Ok(web::Bytes::from(text)), Some((tokens, sent + 1)))),
            Ok(Some(Err(e))) => {
                error!("[{}] Stream failed after {} chunks: {:#}", request_id, sent, e);
                Some((Err(io::Error::new(io::ErrorKind::Other, e.to_string())), None))
            }
            Ok(None) => {
                info!("[{}] Streamed {} chunks", request_id, sent);
                None
            }
            Err(_) => {
                warn!("[{}] Deadline hit after {} chunks", request_id, sent);
                Some((
                    Err(io::Error::new(io::ErrorKind::TimedOut, "completion deadline exceeded")),
                    None,
                ))
            }
        }
    })
}
