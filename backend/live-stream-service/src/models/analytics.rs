use super::stream::{StreamStatus, StreamType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Point-in-time analytics for one stream (broadcaster only)
#[derive(Debug, Clone, Serialize)]
pub struct StreamAnalyticsSnapshot {
    pub stream_id: Uuid,
    pub stream_type: StreamType,
    pub status: StreamStatus,
    pub viewer_metrics: ViewerMetrics,
    pub engagement_metrics: EngagementMetrics,
    /// Always serialized; `null` for video streams
    pub commerce_metrics: Option<CommerceMetrics>,
    pub quality_metrics: QualityMetrics,
    pub viewer_countries: BTreeMap<String, u64>,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewerMetrics {
    pub total_unique_viewers: u64,
    pub peak_concurrent_viewers: i64,
    pub current_viewers: i64,
    pub average_watch_duration_seconds: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EngagementMetrics {
    pub total_chat_messages: i64,
    pub total_reactions: u64,
    pub unique_chatters: i64,
    pub reaction_breakdown: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommerceMetrics {
    pub products_featured: u64,
    pub total_views: i64,
    pub total_clicks: i64,
    pub total_purchases: i64,
    pub total_revenue: f64,
    pub conversion_rate: f64,
    pub click_through_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityMetrics {
    pub sessions_recorded: u64,
    pub total_rebuffer_events: i64,
    pub total_rebuffer_duration_ms: i64,
    pub average_rebuffer_events_per_session: f64,
    pub peak_quality_distribution: BTreeMap<String, u64>,
}
