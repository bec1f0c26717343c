use std::sync::Arc;

use actix_files as fs;
use actix_web::{web::Data, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use tera::Tera;

use yardbird::config::Config;
use yardbird::pipeline::RagPipeline;
use yardbird::schema::MetadataSchema;
use yardbird::web::routes;
use yardbird::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting yardbird");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Connect the external services once; every request shares them
    let pipeline = match RagPipeline::from_config(&config, MetadataSchema::musician_profile()).await {
        Ok(pipeline) => {
            info!("RAG pipeline initialized");
            Arc::new(pipeline)
        }
        Err(e) => {
            error!("Failed to initialize RAG pipeline: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize template engine
    let mut tera = match Tera::new("templates/**/*") {
        Ok(t) => t,
        Err(e) => {
            error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
    };
    tera.autoescape_on(vec![".html"]);

    let app_state = Data::new(AppState {
        tera,
        pipeline,
        max_duration: config.max_duration,
    });

    info!("Listening on {}", config.bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
            .service(fs::Files::new("/static", "./static"))
    })
    .bind(config.bind_address.as_str())?
    .run()
    .await
}
