use actix_web::{error, web, HttpResponse};
use log::warn;

use crate::web::handlers;
use crate::web::models::ErrorResponse;

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Bodies without a string `prompt` are rejected before any upstream call.
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid completion request: {}", err);
        warn!("{}", message);
        error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(ErrorResponse { error: message }),
        )
        .into()
    });

    cfg.service(
        web::scope("/api")
            .app_data(json_config)
            .route("/completion", web::post().to(handlers::completion)),
    )
    .route("/", web::get().to(handlers::index))
    .route("/health", web::get().to(handlers::health_check));
}
