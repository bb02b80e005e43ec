//! Request schemas for the HTTP surface
//!
//! Each endpoint deserializes into one of these and runs `validator` before
//! anything touches the store. Required fields are `Option` so a missing
//! field surfaces as a per-field message instead of a serde error.

use super::chat::{MessageType, ModerationStatus};
use super::product::{validate_purchase_revenue, ProductEvent, ProductSort};
use super::session::{QualityLayer, QualityReport};
use super::stream::{PrivacySetting, StreamPatch, StreamStatus, StreamType};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_STREAM_PAGE_SIZE: i64 = 20;
pub const DEFAULT_CHAT_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStreamRequest {
    #[validate(required(message = "stream_type is required"))]
    pub stream_type: Option<StreamType>,
    #[validate(
        required(message = "title is required"),
        length(min = 1, max = 200, message = "title must be 1-200 characters")
    )]
    pub title: Option<String>,
    #[validate(length(max = 5000, message = "description must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(url(message = "thumbnail_url must be a valid URL"))]
    pub thumbnail_url: Option<String>,
    pub privacy_setting: Option<PrivacySetting>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    #[validate(length(max = 16, message = "language must be at most 16 characters"))]
    pub language: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20, message = "at most 20 tags are allowed"))]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStreamRequest {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 5000, message = "description must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(url(message = "thumbnail_url must be a valid URL"))]
    pub thumbnail_url: Option<String>,
    pub privacy_setting: Option<PrivacySetting>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
}

impl From<UpdateStreamRequest> for StreamPatch {
    fn from(req: UpdateStreamRequest) -> Self {
        StreamPatch {
            title: req.title,
            description: req.description,
            thumbnail_url: req.thumbnail_url,
            privacy_setting: req.privacy_setting,
            scheduled_start_time: req.scheduled_start_time,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListStreamsQuery {
    pub status: Option<StreamStatus>,
    pub stream_type: Option<StreamType>,
    pub broadcaster_id: Option<Uuid>,
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<i64>,
    #[validate(range(min = 0, message = "offset must not be negative"))]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetStreamQuery {
    #[serde(default)]
    pub include_analytics: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendChatRequest {
    #[validate(required(message = "message is required"))]
    pub message: Option<String>,
    #[serde(default)]
    pub message_type: MessageType,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListChatQuery {
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<i64>,
    pub before_timestamp: Option<DateTime<Utc>>,
    pub after_timestamp: Option<DateTime<Utc>>,
    pub moderation_status: Option<ModerationStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ModerationRequest {
    #[validate(required(message = "moderation_status is required"))]
    pub moderation_status: Option<ModerationStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendReactionRequest {
    #[validate(required(message = "reaction is required"))]
    pub reaction: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FeatureProductRequest {
    #[validate(required(message = "product_id is required"))]
    pub product_id: Option<Uuid>,
    #[validate(range(min = 0, message = "display_position must not be negative"))]
    #[serde(default)]
    pub display_position: i32,
    #[serde(default)]
    pub display_priority: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default)]
    pub include_analytics: bool,
    #[serde(default)]
    pub sort_by: ProductSort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductEventKind {
    View,
    Click,
    Purchase,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductEventRequest {
    #[validate(required(message = "event is required"))]
    pub event: Option<ProductEventKind>,
    pub revenue: Option<f64>,
}

impl ProductEventRequest {
    /// Purchases carry a finite, non-negative revenue; other events carry none
    pub fn into_event(self) -> Result<ProductEvent> {
        match self.event {
            Some(ProductEventKind::View) => Ok(ProductEvent::View),
            Some(ProductEventKind::Click) => Ok(ProductEvent::Click),
            Some(ProductEventKind::Purchase) => {
                let revenue = self.revenue.unwrap_or(0.0);
                validate_purchase_revenue(revenue)?;
                Ok(ProductEvent::Purchase { revenue })
            }
            None => Err(AppError::Validation("event is required".to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct JoinSessionRequest {
    pub quality_layer: Option<QualityLayer>,
    #[validate(length(min = 2, max = 2, message = "viewer_country must be an ISO 3166 alpha-2 code"))]
    pub viewer_country: Option<String>,
    #[validate(length(max = 32, message = "device_type must be at most 32 characters"))]
    pub device_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct QualityReportRequest {
    pub quality_layer: Option<QualityLayer>,
    #[validate(range(
        min = 0,
        max = 10_000,
        message = "rebuffer_events must be between 0 and 10000"
    ))]
    #[serde(default)]
    pub rebuffer_events: i32,
    #[validate(range(
        min = 0,
        max = 3_600_000,
        message = "rebuffer_duration_ms must be between 0 and 3600000"
    ))]
    #[serde(default)]
    pub rebuffer_duration_ms: i64,
}

impl From<QualityReportRequest> for QualityReport {
    fn from(req: QualityReportRequest) -> Self {
        QualityReport {
            quality_layer: req.quality_layer,
            rebuffer_events: req.rebuffer_events,
            rebuffer_duration_ms: req.rebuffer_duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_reports_missing_fields() {
        let req: CreateStreamRequest = serde_json::from_str("{}").unwrap();
        let err = req.validate().unwrap_err();
        let fields = err.field_errors();
        assert!(fields.contains_key("stream_type"));
        assert!(fields.contains_key("title"));
    }

    #[test]
    fn test_create_request_limits() {
        let req = CreateStreamRequest {
            stream_type: Some(StreamType::Video),
            title: Some("t".repeat(201)),
            description: Some("d".repeat(5001)),
            thumbnail_url: None,
            privacy_setting: None,
            scheduled_start_time: None,
            language: None,
            tags: vec!["x".to_string(); 21],
        };
        let err = req.validate().unwrap_err();
        let fields = err.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("description"));
        assert!(fields.contains_key("tags"));
    }

    #[test]
    fn test_purchase_revenue_must_be_non_negative() {
        let req = ProductEventRequest {
            event: Some(ProductEventKind::Purchase),
            revenue: Some(-1.0),
        };
        assert!(matches!(req.into_event(), Err(AppError::Validation(_))));

        let req = ProductEventRequest {
            event: Some(ProductEventKind::Purchase),
            revenue: Some(19.99),
        };
        assert_eq!(
            req.into_event().unwrap(),
            ProductEvent::Purchase { revenue: 19.99 }
        );
    }

    #[test]
    fn test_purchase_revenue_is_bounded() {
        let req = ProductEventRequest {
            event: Some(ProductEventKind::Purchase),
            revenue: Some(1e308),
        };
        assert!(matches!(req.into_event(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_quality_report_bounds() {
        let req = QualityReportRequest {
            rebuffer_events: i32::MAX,
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let req = QualityReportRequest {
            rebuffer_events: 3,
            rebuffer_duration_ms: 4_500,
            ..Default::default()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_list_query_bounds() {
        let query = ListStreamsQuery {
            limit: Some(101),
            ..Default::default()
        };
        assert!(query.validate().is_err());

        let query = ListStreamsQuery {
            limit: Some(100),
            offset: Some(0),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
    }
}
