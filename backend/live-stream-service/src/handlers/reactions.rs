use crate::error::Result;
use crate::models::{Actor, SendReactionRequest};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use uuid::Uuid;

pub async fn send_reaction(
    state: web::Data<AppState>,
    actor: Actor,
    stream_id: web::Path<Uuid>,
    req: web::Json<SendReactionRequest>,
) -> Result<HttpResponse> {
    let receipt = state
        .reactions
        .send_reaction(&actor, *stream_id, req.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(receipt))
}

pub async fn reaction_summary(
    state: web::Data<AppState>,
    stream_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let aggregation = state.reactions.summary(*stream_id).await?;
    Ok(HttpResponse::Ok().json(aggregation))
}
