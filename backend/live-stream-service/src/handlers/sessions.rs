/// Viewer session handlers
use crate::error::Result;
use crate::middleware::auth::client_address;
use crate::models::{Actor, JoinSessionRequest, QualityReportRequest};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;
use validator::Validate;

pub async fn join_stream(
    state: web::Data<AppState>,
    actor: Actor,
    http_req: HttpRequest,
    stream_id: web::Path<Uuid>,
    req: Option<web::Json<JoinSessionRequest>>,
) -> Result<HttpResponse> {
    let req = req.map(web::Json::into_inner).unwrap_or_default();
    let session = state
        .sessions
        .join(&actor, *stream_id, req, Some(client_address(&http_req)))
        .await?;
    Ok(HttpResponse::Created().json(session))
}

pub async fn report_quality(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<QualityReportRequest>,
) -> Result<HttpResponse> {
    let (stream_id, session_id) = path.into_inner();
    let req = req.into_inner();
    req.validate()?;

    let session = state
        .sessions
        .report_quality(&actor, stream_id, session_id, req.into())
        .await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn leave_stream(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse> {
    let (stream_id, session_id) = path.into_inner();
    let session = state.sessions.leave(&actor, stream_id, session_id).await?;
    Ok(HttpResponse::Ok().json(session))
}
