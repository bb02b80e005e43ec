use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Delivery quality ladder, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLayer {
    Low,
    Medium,
    High,
    Source,
}

impl QualityLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLayer::Low => "low",
            QualityLayer::Medium => "medium",
            QualityLayer::High => "high",
            QualityLayer::Source => "source",
        }
    }
}

impl FromStr for QualityLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(QualityLayer::Low),
            "medium" => Ok(QualityLayer::Medium),
            "high" => Ok(QualityLayer::High),
            "source" => Ok(QualityLayer::Source),
            other => Err(format!("unknown quality layer: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSession {
    pub id: Uuid,
    pub stream_id: Uuid,
    pub viewer_id: Option<Uuid>,
    /// Actor identity (`user:<id>` / `anon:<addr>`) used for unique counts
    pub viewer_identity: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub watch_duration_seconds: Option<i64>,
    pub peak_quality_layer: Option<QualityLayer>,
    pub rebuffer_events: i32,
    pub rebuffer_duration_ms: i64,
    pub viewer_ip: Option<String>,
    pub viewer_country: Option<String>,
    pub device_type: Option<String>,
}

impl ViewerSession {
    pub fn is_open(&self) -> bool {
        self.left_at.is_none()
    }

    pub fn close(&mut self, left_at: DateTime<Utc>) {
        let seconds = left_at
            .signed_duration_since(self.joined_at)
            .num_seconds()
            .max(0);
        self.left_at = Some(left_at);
        self.watch_duration_seconds = Some(seconds);
    }

    /// Leaves the session untouched when a running total would overflow
    pub fn apply_quality(&mut self, report: &QualityReport) -> crate::error::Result<()> {
        let rebuffer_events = self
            .rebuffer_events
            .checked_add(report.rebuffer_events)
            .ok_or_else(|| AppError::Validation("rebuffer_events total overflows".to_string()))?;
        let rebuffer_duration_ms = self
            .rebuffer_duration_ms
            .checked_add(report.rebuffer_duration_ms)
            .ok_or_else(|| {
                AppError::Validation("rebuffer_duration_ms total overflows".to_string())
            })?;

        if let Some(layer) = report.quality_layer {
            self.peak_quality_layer = Some(match self.peak_quality_layer {
                Some(current) => current.max(layer),
                None => layer,
            });
        }
        self.rebuffer_events = rebuffer_events;
        self.rebuffer_duration_ms = rebuffer_duration_ms;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub quality_layer: Option<QualityLayer>,
    pub rebuffer_events: i32,
    pub rebuffer_duration_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session() -> ViewerSession {
        ViewerSession {
            id: Uuid::new_v4(),
            stream_id: Uuid::new_v4(),
            viewer_id: None,
            viewer_identity: "anon:127.0.0.1".into(),
            joined_at: Utc::now(),
            left_at: None,
            watch_duration_seconds: None,
            peak_quality_layer: Some(QualityLayer::Medium),
            rebuffer_events: 0,
            rebuffer_duration_ms: 0,
            viewer_ip: None,
            viewer_country: None,
            device_type: None,
        }
    }

    #[test]
    fn test_quality_keeps_peak() {
        let mut s = session();
        s.apply_quality(&QualityReport {
            quality_layer: Some(QualityLayer::Low),
            rebuffer_events: 2,
            rebuffer_duration_ms: 300,
        })
        .unwrap();
        assert_eq!(s.peak_quality_layer, Some(QualityLayer::Medium));
        s.apply_quality(&QualityReport {
            quality_layer: Some(QualityLayer::Source),
            rebuffer_events: 1,
            rebuffer_duration_ms: 100,
        })
        .unwrap();
        assert_eq!(s.peak_quality_layer, Some(QualityLayer::Source));
        assert_eq!(s.rebuffer_events, 3);
        assert_eq!(s.rebuffer_duration_ms, 400);
    }

    #[test]
    fn test_quality_totals_never_overflow() {
        let mut s = session();
        s.rebuffer_events = i32::MAX;
        s.rebuffer_duration_ms = 1_000;

        let result = s.apply_quality(&QualityReport {
            quality_layer: Some(QualityLayer::Source),
            rebuffer_events: 1,
            rebuffer_duration_ms: 500,
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(s.rebuffer_events, i32::MAX);
        assert_eq!(s.rebuffer_duration_ms, 1_000);
        assert_eq!(s.peak_quality_layer, Some(QualityLayer::Medium));
    }

    #[test]
    fn test_close_derives_watch_duration() {
        let mut s = session();
        let left = s.joined_at + Duration::seconds(95);
        s.close(left);
        assert!(!s.is_open());
        assert_eq!(s.watch_duration_seconds, Some(95));
    }
}
