/// Featured product handlers
use crate::error::Result;
use crate::models::{Actor, FeatureProductRequest, ListProductsQuery, ProductEventRequest};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use uuid::Uuid;
use validator::Validate;

pub async fn feature_product(
    state: web::Data<AppState>,
    actor: Actor,
    stream_id: web::Path<Uuid>,
    req: web::Json<FeatureProductRequest>,
) -> Result<HttpResponse> {
    let feature = state
        .products
        .feature_product(&actor, *stream_id, req.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(feature))
}

pub async fn list_products(
    state: web::Data<AppState>,
    stream_id: web::Path<Uuid>,
    query: web::Query<ListProductsQuery>,
) -> Result<HttpResponse> {
    let products = state
        .products
        .list_products(*stream_id, query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(products))
}

pub async fn unfeature_product(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse> {
    let (stream_id, feature_id) = path.into_inner();
    state
        .products
        .unfeature_product(&actor, stream_id, feature_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn record_product_event(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<ProductEventRequest>,
) -> Result<HttpResponse> {
    let (stream_id, feature_id) = path.into_inner();
    let req = req.into_inner();
    req.validate()?;

    let feature = state
        .products
        .record_event(&actor, stream_id, feature_id, req.into_event()?)
        .await?;
    Ok(HttpResponse::Ok().json(feature))
}
