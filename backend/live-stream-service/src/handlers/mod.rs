//! HTTP handlers for Live Stream Service
//!
//! All engine endpoints live under `/api/v1`. Bodies and query strings that
//! fail to deserialize are reported through [`AppError`] like every other
//! validation failure.

pub mod analytics;
pub mod chat;
pub mod products;
pub mod reactions;
pub mod sessions;
pub mod streams;

use crate::error::AppError;
use actix_web::{error, web, HttpResponse};
use serde_json::json;

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| {
            let message = match &err {
                error::JsonPayloadError::Deserialize(e) => e.to_string(),
                other => other.to_string(),
            };
            AppError::Validation(message).into()
        })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "live-stream-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Register `/api/v1` routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(json_config())
            .app_data(query_config())
            .service(
                web::resource("/streams")
                    .route(web::post().to(streams::create_stream))
                    .route(web::get().to(streams::list_streams)),
            )
            .service(
                web::resource("/streams/{stream_id}")
                    .route(web::get().to(streams::get_stream))
                    .route(web::patch().to(streams::update_stream)),
            )
            .route(
                "/streams/{stream_id}/start",
                web::post().to(streams::start_stream),
            )
            .route("/streams/{stream_id}/end", web::post().to(streams::end_stream))
            .service(
                web::resource("/streams/{stream_id}/chat")
                    .route(web::post().to(chat::send_message))
                    .route(web::get().to(chat::list_messages)),
            )
            .service(
                web::resource("/streams/{stream_id}/chat/{message_id}")
                    .route(web::delete().to(chat::delete_message))
                    .route(web::patch().to(chat::moderate_message)),
            )
            .service(
                web::resource("/streams/{stream_id}/reactions")
                    .route(web::post().to(reactions::send_reaction))
                    .route(web::get().to(reactions::reaction_summary)),
            )
            .service(
                web::resource("/streams/{stream_id}/products")
                    .route(web::post().to(products::feature_product))
                    .route(web::get().to(products::list_products)),
            )
            .route(
                "/streams/{stream_id}/products/{feature_id}",
                web::delete().to(products::unfeature_product),
            )
            .route(
                "/streams/{stream_id}/products/{feature_id}/events",
                web::post().to(products::record_product_event),
            )
            .route(
                "/streams/{stream_id}/sessions",
                web::post().to(sessions::join_stream),
            )
            .route(
                "/streams/{stream_id}/sessions/{session_id}/quality",
                web::post().to(sessions::report_quality),
            )
            .route(
                "/streams/{stream_id}/sessions/{session_id}/leave",
                web::post().to(sessions::leave_stream),
            )
            .route(
                "/streams/{stream_id}/analytics",
                web::get().to(analytics::get_stream_analytics),
            ),
    );
}
