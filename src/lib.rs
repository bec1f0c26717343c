pub mod config;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod store;
pub mod web;

use std::sync::Arc;
use std::time::Duration;

use tera::Tera;

use pipeline::RagPipeline;

// App state structure
pub struct AppState {
    pub tera: Tera,
    pub pipeline: Arc<RagPipeline>,
    /// Ceiling for a whole completion request, streaming included.
    pub max_duration: Duration,
}
