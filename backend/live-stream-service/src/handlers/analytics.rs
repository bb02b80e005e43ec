use crate::error::Result;
use crate::models::Actor;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use uuid::Uuid;

/// Broadcaster-only snapshot
pub async fn get_stream_analytics(
    state: web::Data<AppState>,
    actor: Actor,
    stream_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let snapshot = state.analytics.snapshot(&actor, *stream_id).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}
