/// Stream lifecycle handlers
use crate::error::Result;
use crate::models::{
    Actor, CreateStreamRequest, GetStreamQuery, ListStreamsQuery, Stream,
    StreamAnalyticsSnapshot, UpdateStreamRequest,
};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
pub struct StreamDetails {
    #[serde(flatten)]
    pub stream: Stream,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<StreamAnalyticsSnapshot>,
}

pub async fn create_stream(
    state: web::Data<AppState>,
    actor: Actor,
    req: web::Json<CreateStreamRequest>,
) -> Result<HttpResponse> {
    let stream = state.streams.create_stream(&actor, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(stream))
}

pub async fn list_streams(
    state: web::Data<AppState>,
    actor: Actor,
    query: web::Query<ListStreamsQuery>,
) -> Result<HttpResponse> {
    let page = state.streams.list_streams(&actor, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Get a stream, optionally with the broadcaster's analytics snapshot
pub async fn get_stream(
    state: web::Data<AppState>,
    actor: Actor,
    stream_id: web::Path<Uuid>,
    query: web::Query<GetStreamQuery>,
) -> Result<HttpResponse> {
    let stream = state.streams.get_stream(&actor, *stream_id).await?;
    let analytics = if query.include_analytics {
        Some(state.analytics.snapshot(&actor, *stream_id).await?)
    } else {
        None
    };

    Ok(HttpResponse::Ok().json(StreamDetails { stream, analytics }))
}

pub async fn update_stream(
    state: web::Data<AppState>,
    actor: Actor,
    stream_id: web::Path<Uuid>,
    req: web::Json<UpdateStreamRequest>,
) -> Result<HttpResponse> {
    let stream = state
        .streams
        .update_stream(&actor, *stream_id, req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(stream))
}

pub async fn start_stream(
    state: web::Data<AppState>,
    actor: Actor,
    stream_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let stream = state.streams.start_stream(&actor, *stream_id).await?;
    Ok(HttpResponse::Ok().json(stream))
}

pub async fn end_stream(
    state: web::Data<AppState>,
    actor: Actor,
    stream_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let ended = state.streams.end_stream(&actor, *stream_id).await?;
    Ok(HttpResponse::Ok().json(ended))
}
