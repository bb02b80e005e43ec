pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod repository;
pub mod services;
pub mod state;

pub use error::{AppError, Result};

use actix_web::web;
use middleware::JwtValidator;
use state::AppState;

/// Routes and shared data for one actix `App`
pub fn configure_service(
    state: web::Data<AppState>,
    jwt: web::Data<JwtValidator>,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(state)
            .app_data(jwt)
            .route("/health", web::get().to(handlers::health))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .route(
                "/api-docs/openapi.json",
                web::get().to(openapi::serve_openapi),
            );
        handlers::configure(cfg);
    }
}
