#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use chrono::{DateTime, Duration, Utc};
use common::{authed, Harness};
use serde_json::{json, Value};
use uuid::Uuid;

#[actix_web::test]
async fn test_create_video_stream_without_kyc() {
    let harness = Harness::new();
    let app = init_app!(harness);
    let token = harness.token(Uuid::new_v4(), 0);

    let req = authed(TestRequest::post().uri("/api/v1/streams"), &token)
        .set_json(json!({"stream_type": "video", "title": "Cooking live"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "scheduled");
    assert_eq!(body["viewer_count"], 0);
    assert!(body["stream_key"].as_str().unwrap().starts_with("live_"));
    assert!(body["session_id"].as_str().unwrap().starts_with("sess_"));
}

#[actix_web::test]
async fn test_store_stream_requires_kyc_tier() {
    let harness = Harness::new();
    let app = init_app!(harness);
    let token = harness.token(Uuid::new_v4(), 0);

    let req = authed(TestRequest::post().uri("/api/v1/streams"), &token)
        .set_json(common::create_stream_body("store"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error_type"], "kyc_required");
    assert_eq!(body["required_kyc_tier"], 1);
    assert_eq!(body["current_kyc_tier"], 0);
    assert!(body["verification_url"].as_str().is_some());

    let verified = harness.token(Uuid::new_v4(), 1);
    let req = authed(TestRequest::post().uri("/api/v1/streams"), &verified)
        .set_json(common::create_stream_body("store"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[actix_web::test]
async fn test_create_stream_rejects_anonymous_and_bad_input() {
    let harness = Harness::new();
    let app = init_app!(harness);

    let req = TestRequest::post()
        .uri("/api/v1/streams")
        .set_json(common::create_stream_body("video"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = TestRequest::post()
        .uri("/api/v1/streams")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .set_json(common::create_stream_body("video"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let token = harness.token(Uuid::new_v4(), 0);
    let req = authed(TestRequest::post().uri("/api/v1/streams"), &token)
        .set_json(json!({"stream_type": "video", "title": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = authed(TestRequest::post().uri("/api/v1/streams"), &token)
        .set_json(json!({"stream_type": "radio", "title": "x"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_start_and_end_transitions() {
    let harness = Harness::new();
    let app = init_app!(harness);
    let token = harness.token(Uuid::new_v4(), 0);
    let stream_id = create_stream!(app, token, "video");

    // ending a scheduled stream is not allowed
    let req = authed(
        TestRequest::post().uri(&format!("/api/v1/streams/{}/end", stream_id)),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    start_stream!(app, token, stream_id);

    let req = authed(
        TestRequest::post().uri(&format!("/api/v1/streams/{}/start", stream_id)),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = authed(
        TestRequest::post().uri(&format!("/api/v1/streams/{}/end", stream_id)),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["stream"]["status"], "ended");
    assert_eq!(body["stream"]["viewer_count"], 0);
    assert_eq!(body["recording_metadata"]["processing_status"], "processing");
    assert_eq!(body["recording_metadata"]["retention_days"], 30);

    let end_time: DateTime<Utc> = body["stream"]["end_time"].as_str().unwrap().parse().unwrap();
    let expiry: DateTime<Utc> = body["stream"]["recording_expiry_date"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(expiry - end_time, Duration::days(30));

    // ended is terminal
    let req = authed(
        TestRequest::post().uri(&format!("/api/v1/streams/{}/start", stream_id)),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let names: Vec<&str> = harness
        .events
        .events()
        .await
        .iter()
        .map(|e| e.name())
        .collect();
    assert_eq!(names, vec!["stream.started", "stream.ended"]);
}

#[actix_web::test]
async fn test_only_owner_controls_stream() {
    let harness = Harness::new();
    let app = init_app!(harness);
    let owner = harness.token(Uuid::new_v4(), 0);
    let other = harness.token(Uuid::new_v4(), 0);
    let stream_id = create_stream!(app, owner, "video");

    let req = authed(
        TestRequest::post().uri(&format!("/api/v1/streams/{}/start", stream_id)),
        &other,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    start_stream!(app, owner, stream_id);

    let req = authed(
        TestRequest::post().uri(&format!("/api/v1/streams/{}/end", stream_id)),
        &other,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // viewers never see the ingest key
    let req = authed(
        TestRequest::get().uri(&format!("/api/v1/streams/{}", stream_id)),
        &other,
    )
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body.get("stream_key").is_none());
    assert_eq!(body["status"], "live");
}

#[actix_web::test]
async fn test_update_restricted_while_live() {
    let harness = Harness::new();
    let app = init_app!(harness);
    let token = harness.token(Uuid::new_v4(), 0);
    let stream_id = create_stream!(app, token, "video");

    let req = authed(
        TestRequest::patch().uri(&format!("/api/v1/streams/{}", stream_id)),
        &token,
    )
    .set_json(json!({"privacy_setting": "followers_only"}))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    start_stream!(app, token, stream_id);

    let req = authed(
        TestRequest::patch().uri(&format!("/api/v1/streams/{}", stream_id)),
        &token,
    )
    .set_json(json!({"privacy_setting": "public"}))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = authed(
        TestRequest::patch().uri(&format!("/api/v1/streams/{}", stream_id)),
        &token,
    )
    .set_json(json!({"title": "Renamed while live"}))
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["title"], "Renamed while live");

    let req = authed(
        TestRequest::patch().uri(&format!("/api/v1/streams/{}", stream_id)),
        &token,
    )
    .set_json(json!({}))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_list_and_get_streams() {
    let harness = Harness::new();
    let app = init_app!(harness);
    let token = harness.token(Uuid::new_v4(), 1);
    let video = create_stream!(app, token, "video");
    create_stream!(app, token, "store");
    start_stream!(app, token, video);

    let req = TestRequest::get()
        .uri("/api/v1/streams?status=live")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["streams"][0]["id"], video.as_str());

    let req = TestRequest::get()
        .uri("/api/v1/streams?limit=500")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = TestRequest::get()
        .uri(&format!("/api/v1/streams/{}", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_health_endpoint() {
    let harness = Harness::new();
    let app = init_app!(harness);

    let req = TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
}
