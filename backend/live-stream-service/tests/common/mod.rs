#![allow(dead_code, unused_macros)]

use actix_web::http::header;
use actix_web::test::TestRequest;
use actix_web::web;
use chrono::{Duration, Utc};
use live_stream_service::middleware::{Claims, JwtValidator};
use live_stream_service::repository::MemoryStore;
use live_stream_service::services::{
    InMemoryRateLimiter, NoRecipients, RateLimitPolicy, RecordingEventPublisher,
    StaticProductCatalog,
};
use live_stream_service::state::{AppState, Collaborators, EngineSettings};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret";

/// Shared data for one test app. Rate-limit windows are widened to a minute
/// so bursts in a test never straddle a window reset.
pub struct Harness {
    pub state: web::Data<AppState>,
    pub jwt: web::Data<JwtValidator>,
    pub events: Arc<RecordingEventPublisher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_catalog(StaticProductCatalog::allow_all())
    }

    pub fn with_catalog(catalog: StaticProductCatalog) -> Self {
        let events = Arc::new(RecordingEventPublisher::new());
        let window = std::time::Duration::from_secs(60);
        let settings = EngineSettings {
            chat_policy: RateLimitPolicy::per_window(5, window),
            reaction_policy: RateLimitPolicy::per_window(10, window),
            ..EngineSettings::default()
        };

        let state = AppState::new(
            Collaborators {
                store: Arc::new(MemoryStore::new()),
                limiter: Arc::new(InMemoryRateLimiter::new()),
                catalog: Arc::new(catalog),
                events: events.clone(),
                recipients: Arc::new(NoRecipients),
            },
            settings,
        );

        Self {
            state: web::Data::new(state),
            jwt: web::Data::new(JwtValidator::new(TEST_SECRET)),
            events,
        }
    }

    pub fn token(&self, user_id: Uuid, kyc_tier: i16) -> String {
        self.jwt
            .issue(&Claims {
                sub: user_id.to_string(),
                username: Some(format!("user-{}", &user_id.simple().to_string()[..6])),
                kyc_tier,
                exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
            })
            .unwrap()
    }
}

pub fn authed(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
}

pub fn create_stream_body(stream_type: &str) -> Value {
    serde_json::json!({
        "stream_type": stream_type,
        "title": format!("{} stream", stream_type),
        "tags": ["demo"],
    })
}

/// Build the app from a [`Harness`]
macro_rules! init_app {
    ($harness:expr) => {
        actix_web::test::init_service(actix_web::App::new().configure(
            live_stream_service::configure_service(
                $harness.state.clone(),
                $harness.jwt.clone(),
            ),
        ))
        .await
    };
}

/// Create a stream as `token` and return its id
macro_rules! create_stream {
    ($app:expr, $token:expr, $stream_type:expr) => {{
        let req = common::authed(
            actix_web::test::TestRequest::post().uri("/api/v1/streams"),
            &$token,
        )
        .set_json(common::create_stream_body($stream_type))
        .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        body["id"].as_str().unwrap().to_string()
    }};
}

/// Start a stream owned by `token`
macro_rules! start_stream {
    ($app:expr, $token:expr, $stream_id:expr) => {{
        let req = common::authed(
            actix_web::test::TestRequest::post()
                .uri(&format!("/api/v1/streams/{}/start", $stream_id)),
            &$token,
        )
        .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    }};
}
