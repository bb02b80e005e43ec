//! Broadcaster analytics snapshots
//!
//! Pure reader over the store. Figures that contradict each other are
//! reported as [`AppError::AggregationInconsistency`] rather than clamped.

use super::featured_products::percentage;
use super::stream_registry::load_stream;
use super::viewer_sessions::SessionSummary;
use crate::error::{AppError, Result};
use crate::models::{
    Actor, CommerceMetrics, EngagementMetrics, FeaturedProduct, QualityMetrics,
    ReactionAggregation, Stream, StreamAnalyticsSnapshot, StreamType, ViewerMetrics,
};
use crate::repository::{
    ChatRepository, FeaturedProductRepository, LiveStore, ReactionRepository,
    ViewerSessionRepository,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct AnalyticsService {
    store: Arc<dyn LiveStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn LiveStore>) -> Self {
        Self { store }
    }

    pub async fn snapshot(&self, actor: &Actor, stream_id: Uuid) -> Result<StreamAnalyticsSnapshot> {
        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        if !actor.is_user(stream.broadcaster_id) {
            return Err(AppError::Forbidden(
                "analytics are only available to the broadcaster".to_string(),
            ));
        }
        self.snapshot_for(&stream).await
    }

    /// Snapshot without the ownership check; callers have already authorized
    pub async fn snapshot_for(&self, stream: &Stream) -> Result<StreamAnalyticsSnapshot> {
        let sessions = self.store.list_sessions(stream.id).await?;
        let chat = self.store.chat_stats(stream.id).await?;
        let reactions =
            ReactionAggregation::from_counts(self.store.reaction_counts(stream.id).await?);

        let commerce_metrics = match stream.stream_type {
            StreamType::Store => {
                let products = self.store.list_featured_products(stream.id, true).await?;
                Some(commerce_metrics(&products)?)
            }
            StreamType::Video => None,
        };

        if stream.viewer_count < 0 || stream.viewer_count > stream.peak_viewer_count {
            return Err(AppError::AggregationInconsistency(format!(
                "viewer_count {} outside [0, peak {}]",
                stream.viewer_count, stream.peak_viewer_count
            )));
        }

        let summary = SessionSummary::from_sessions(&sessions);
        let average_rebuffer_events_per_session = if summary.sessions_recorded == 0 {
            0.0
        } else {
            summary.total_rebuffer_events as f64 / summary.sessions_recorded as f64
        };

        Ok(StreamAnalyticsSnapshot {
            stream_id: stream.id,
            stream_type: stream.stream_type,
            status: stream.status,
            viewer_metrics: ViewerMetrics {
                total_unique_viewers: summary.total_unique_viewers,
                peak_concurrent_viewers: stream.peak_viewer_count,
                current_viewers: stream.viewer_count,
                average_watch_duration_seconds: summary.average_watch_duration_seconds,
            },
            engagement_metrics: EngagementMetrics {
                total_chat_messages: chat.total_messages,
                total_reactions: reactions.total_reactions,
                unique_chatters: chat.unique_chatters,
                reaction_breakdown: reactions.reaction_counts,
            },
            commerce_metrics,
            quality_metrics: QualityMetrics {
                sessions_recorded: summary.sessions_recorded,
                total_rebuffer_events: summary.total_rebuffer_events,
                total_rebuffer_duration_ms: summary.total_rebuffer_duration_ms,
                average_rebuffer_events_per_session,
                peak_quality_distribution: summary.peak_quality_distribution,
            },
            viewer_countries: summary.viewer_countries,
            calculated_at: Utc::now(),
        })
    }
}

/// Totals across every feature the stream ever had, active or not
pub fn commerce_metrics(products: &[FeaturedProduct]) -> Result<CommerceMetrics> {
    let mut metrics = CommerceMetrics {
        products_featured: products.len() as u64,
        ..Default::default()
    };

    for product in products {
        if product.view_count < 0 || product.click_count < 0 || product.purchase_count < 0 {
            return Err(AppError::AggregationInconsistency(format!(
                "featured product {} has negative counters",
                product.id
            )));
        }
        if !product.revenue_generated.is_finite() || product.revenue_generated < 0.0 {
            return Err(AppError::AggregationInconsistency(format!(
                "featured product {} has invalid revenue {}",
                product.id, product.revenue_generated
            )));
        }

        metrics.total_views += product.view_count;
        metrics.total_clicks += product.click_count;
        metrics.total_purchases += product.purchase_count;
        metrics.total_revenue += product.revenue_generated;
    }

    metrics.conversion_rate = percentage(metrics.total_purchases, metrics.total_clicks);
    metrics.click_through_rate = percentage(metrics.total_clicks, metrics.total_views);
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(views: i64, clicks: i64, purchases: i64, revenue: f64) -> FeaturedProduct {
        let mut p = FeaturedProduct::new(Uuid::new_v4(), Uuid::new_v4(), 0, 0, Utc::now());
        p.view_count = views;
        p.click_count = clicks;
        p.purchase_count = purchases;
        p.revenue_generated = revenue;
        p
    }

    #[test]
    fn test_commerce_totals() {
        let metrics =
            commerce_metrics(&[product(100, 20, 2, 40.0), product(100, 20, 2, 60.0)]).unwrap();
        assert_eq!(metrics.products_featured, 2);
        assert_eq!(metrics.total_views, 200);
        assert_eq!(metrics.total_clicks, 40);
        assert_eq!(metrics.total_purchases, 4);
        assert_eq!(metrics.total_revenue, 100.0);
        assert!((metrics.conversion_rate - 10.0).abs() < 1e-9);
        assert!((metrics.click_through_rate - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_products_yields_zeroes() {
        let metrics = commerce_metrics(&[]).unwrap();
        assert_eq!(metrics, CommerceMetrics::default());
    }

    #[test]
    fn test_inconsistent_revenue_is_surfaced() {
        assert!(matches!(
            commerce_metrics(&[product(1, 1, 1, -5.0)]),
            Err(AppError::AggregationInconsistency(_))
        ));
        assert!(matches!(
            commerce_metrics(&[product(1, 1, 1, f64::NAN)]),
            Err(AppError::AggregationInconsistency(_))
        ));
        assert!(matches!(
            commerce_metrics(&[product(-1, 0, 0, 0.0)]),
            Err(AppError::AggregationInconsistency(_))
        ));
    }
}
