//! Featured products on store streams
//!
//! The active set per stream is bounded; the count and the insert happen in
//! one exclusive section in the store. Counters only ever move through
//! [`FeaturedProductRepository::record_product_event`].

use super::catalog::ProductCatalog;
use super::stream_registry::{ensure_owner, load_stream};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    validate_purchase_revenue, Actor, FeatureInsert, FeatureProductRequest, FeaturedProduct,
    FeaturedProductView, ListProductsQuery, ProductEvent, ProductPerformance, ProductSort,
    StreamType,
};
use crate::repository::{FeaturedProductRepository, LiveStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// `numerator / denominator * 100`, or 0 when the denominator is 0
pub(crate) fn percentage(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

pub fn compute_product_performance(product: &FeaturedProduct) -> ProductPerformance {
    ProductPerformance {
        conversion_rate: percentage(product.purchase_count, product.click_count),
        click_through_rate: percentage(product.click_count, product.view_count),
        average_order_value: (product.purchase_count > 0)
            .then(|| product.revenue_generated / product.purchase_count as f64),
    }
}

fn sort_products(products: &mut [FeaturedProduct], sort: ProductSort) {
    match sort {
        ProductSort::Priority => products.sort_by(|a, b| {
            a.display_priority
                .cmp(&b.display_priority)
                .then(a.featured_at.cmp(&b.featured_at))
        }),
        ProductSort::Revenue => products.sort_by(|a, b| {
            b.revenue_generated
                .total_cmp(&a.revenue_generated)
                .then(a.display_priority.cmp(&b.display_priority))
        }),
    }
}

pub struct FeaturedProductService {
    store: Arc<dyn LiveStore>,
    catalog: Arc<dyn ProductCatalog>,
    max_active: usize,
}

impl FeaturedProductService {
    pub fn new(
        store: Arc<dyn LiveStore>,
        catalog: Arc<dyn ProductCatalog>,
        max_active: usize,
    ) -> Self {
        Self {
            store,
            catalog,
            max_active,
        }
    }

    pub async fn feature_product(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        request: FeatureProductRequest,
    ) -> Result<FeaturedProduct> {
        let user = actor.authenticated()?;
        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        ensure_owner(&stream, user)?;

        if stream.stream_type != StreamType::Store {
            return Err(AppError::Validation(
                "products can only be featured on store streams".to_string(),
            ));
        }

        request.validate()?;
        let Some(product_id) = request.product_id else {
            return Err(AppError::Validation("product_id is required".to_string()));
        };

        if !self.catalog.product_exists(product_id).await? {
            return Err(AppError::NotFound(format!("product {}", product_id)));
        }

        let feature = FeaturedProduct::new(
            stream_id,
            product_id,
            request.display_position,
            request.display_priority,
            Utc::now(),
        );

        match self
            .store
            .insert_featured_product(feature, self.max_active)
            .await?
        {
            FeatureInsert::Inserted(feature) => {
                info!(
                    stream_id = %stream_id,
                    product_id = %product_id,
                    feature_id = %feature.id,
                    "Product featured"
                );
                Ok(feature)
            }
            FeatureInsert::AtCapacity { current } => Err(AppError::FeaturedCapacity {
                current,
                max: self.max_active,
            }),
        }
    }

    pub async fn unfeature_product(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        feature_id: Uuid,
    ) -> Result<FeaturedProduct> {
        let user = actor.authenticated()?;
        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        ensure_owner(&stream, user)?;

        let feature = self
            .store
            .unfeature_product(stream_id, feature_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("featured product {}", feature_id)))?;

        info!(stream_id = %stream_id, feature_id = %feature_id, "Product unfeatured");
        Ok(feature)
    }

    /// View, click or purchase on an active feature. Purchases carry revenue
    /// and must come from a signed-in buyer.
    pub async fn record_event(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        feature_id: Uuid,
        event: ProductEvent,
    ) -> Result<FeaturedProduct> {
        if let ProductEvent::Purchase { revenue } = event {
            actor.authenticated()?;
            validate_purchase_revenue(revenue)?;
        }

        load_stream(self.store.as_ref(), stream_id).await?;
        let feature = self
            .store
            .record_product_event(stream_id, feature_id, event)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("featured product {}", feature_id)))?;

        metrics::record_product_event(event.kind());
        Ok(feature)
    }

    /// Active features; empty for video streams
    pub async fn list_products(
        &self,
        stream_id: Uuid,
        query: ListProductsQuery,
    ) -> Result<Vec<FeaturedProductView>> {
        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        if stream.stream_type != StreamType::Store {
            return Ok(Vec::new());
        }

        let mut products = self.store.list_featured_products(stream_id, false).await?;
        sort_products(&mut products, query.sort_by);

        Ok(products
            .into_iter()
            .map(|product| FeaturedProductView {
                analytics: query
                    .include_analytics
                    .then(|| compute_product_performance(&product)),
                product,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn feature(priority: i32, revenue: f64) -> FeaturedProduct {
        let mut product =
            FeaturedProduct::new(Uuid::new_v4(), Uuid::new_v4(), 0, priority, Utc::now());
        product.revenue_generated = revenue;
        product
    }

    #[test]
    fn test_performance_with_zero_denominators() {
        let product = feature(0, 0.0);
        let perf = compute_product_performance(&product);
        assert_eq!(perf.conversion_rate, 0.0);
        assert_eq!(perf.click_through_rate, 0.0);
        assert_eq!(perf.average_order_value, None);
    }

    #[test]
    fn test_performance_rates() {
        let mut product = feature(0, 0.0);
        product.view_count = 200;
        product.click_count = 50;
        product.purchase_count = 5;
        product.revenue_generated = 250.0;

        let perf = compute_product_performance(&product);
        assert!((perf.conversion_rate - 10.0).abs() < 1e-9);
        assert!((perf.click_through_rate - 25.0).abs() < 1e-9);
        assert_eq!(perf.average_order_value, Some(50.0));
    }

    #[test]
    fn test_sort_orders() {
        let mut early = feature(1, 10.0);
        early.featured_at = Utc::now() - Duration::minutes(5);
        let late = feature(1, 30.0);
        let top = feature(0, 20.0);

        let mut by_priority = vec![late.clone(), top.clone(), early.clone()];
        sort_products(&mut by_priority, ProductSort::Priority);
        assert_eq!(
            by_priority.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![top.id, early.id, late.id]
        );

        let mut by_revenue = vec![early.clone(), top.clone(), late.clone()];
        sort_products(&mut by_revenue, ProductSort::Revenue);
        assert_eq!(
            by_revenue.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![late.id, top.id, early.id]
        );
    }
}
