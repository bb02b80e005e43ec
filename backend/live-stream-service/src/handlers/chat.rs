/// Chat and moderation handlers
use crate::error::{AppError, Result};
use crate::models::{Actor, ListChatQuery, ModerationRequest, SendChatRequest};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use uuid::Uuid;
use validator::Validate;

pub async fn send_message(
    state: web::Data<AppState>,
    actor: Actor,
    stream_id: web::Path<Uuid>,
    req: web::Json<SendChatRequest>,
) -> Result<HttpResponse> {
    let message = state
        .chat
        .send_message(&actor, *stream_id, req.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(message))
}

pub async fn list_messages(
    state: web::Data<AppState>,
    stream_id: web::Path<Uuid>,
    query: web::Query<ListChatQuery>,
) -> Result<HttpResponse> {
    let page = state
        .chat
        .list_messages(*stream_id, query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Soft delete
pub async fn delete_message(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse> {
    let (stream_id, message_id) = path.into_inner();
    state
        .moderation
        .delete_message(&actor, stream_id, message_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn moderate_message(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<ModerationRequest>,
) -> Result<HttpResponse> {
    let (stream_id, message_id) = path.into_inner();
    let req = req.into_inner();
    req.validate()?;
    let status = req
        .moderation_status
        .ok_or_else(|| AppError::Validation("moderation_status is required".to_string()))?;

    let message = state
        .moderation
        .set_status(&actor, stream_id, message_id, status)
        .await?;
    Ok(HttpResponse::Ok().json(message))
}
