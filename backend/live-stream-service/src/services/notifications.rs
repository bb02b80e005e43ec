//! Lifecycle events and live-start notification fan-out
//!
//! Publishing never fails a stream transition: errors are logged and dropped.
//! Whether a given follower hears about a broadcast going live is decided by
//! [`should_notify_live_start`] against preferences owned by the notification
//! service.

use crate::error::Result;
use crate::models::{Stream, StreamType};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Quiet window in whole UTC hours, `[start_hour, end_hour)`; may wrap midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl QuietHours {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour == self.end_hour {
            return false;
        }
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // e.g. 22 -> 7
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub push_enabled: bool,
    pub live_stream_enabled: bool,
    pub quiet_hours: Option<QuietHours>,
    /// Only notify for broadcasters the recipient follows
    pub follow_only: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            push_enabled: true,
            live_stream_enabled: true,
            quiet_hours: None,
            follow_only: false,
        }
    }
}

pub fn should_notify_live_start(
    prefs: &NotificationPreferences,
    broadcaster_followed: bool,
    now: DateTime<Utc>,
) -> bool {
    if !prefs.push_enabled || !prefs.live_stream_enabled {
        return false;
    }
    if prefs.follow_only && !broadcaster_followed {
        return false;
    }
    !prefs
        .quiet_hours
        .map_or(false, |quiet| quiet.contains(now.hour()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type")]
pub enum LiveEvent {
    #[serde(rename = "stream.started")]
    StreamStarted {
        stream_id: Uuid,
        broadcaster_id: Uuid,
        stream_type: StreamType,
        title: String,
        started_at: DateTime<Utc>,
    },
    #[serde(rename = "stream.ended")]
    StreamEnded {
        stream_id: Uuid,
        broadcaster_id: Uuid,
        ended_at: DateTime<Utc>,
        duration_seconds: i64,
        peak_viewers: i64,
    },
    #[serde(rename = "notification.live_start")]
    LiveStartNotification {
        recipient_id: Uuid,
        stream_id: Uuid,
        broadcaster_id: Uuid,
        title: String,
    },
}

impl LiveEvent {
    pub fn started(stream: &Stream, started_at: DateTime<Utc>) -> Self {
        LiveEvent::StreamStarted {
            stream_id: stream.id,
            broadcaster_id: stream.broadcaster_id,
            stream_type: stream.stream_type,
            title: stream.title.clone(),
            started_at,
        }
    }

    pub fn ended(stream: &Stream) -> Self {
        LiveEvent::StreamEnded {
            stream_id: stream.id,
            broadcaster_id: stream.broadcaster_id,
            ended_at: stream.end_time.unwrap_or(stream.updated_at),
            duration_seconds: stream.duration_seconds(),
            peak_viewers: stream.peak_viewer_count,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::StreamStarted { .. } => "stream.started",
            LiveEvent::StreamEnded { .. } => "stream.ended",
            LiveEvent::LiveStartNotification { .. } => "notification.live_start",
        }
    }
}

#[async_trait]
pub trait LiveEventPublisher: Send + Sync {
    async fn publish(&self, event: &LiveEvent) -> Result<()>;
}

/// Default publisher: structured log line per event
#[derive(Debug, Default)]
pub struct LoggingEventPublisher;

#[async_trait]
impl LiveEventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: &LiveEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        info!(event = event.name(), %payload, "Published live event");
        Ok(())
    }
}

/// Keeps every published event in memory
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<LiveEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<LiveEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl LiveEventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &LiveEvent) -> Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Publish and swallow the error; lifecycle transitions must not fail on it
pub async fn publish_best_effort(publisher: &dyn LiveEventPublisher, event: &LiveEvent) {
    if let Err(e) = publisher.publish(event).await {
        warn!(event = event.name(), error = %e, "Failed to publish live event");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationCandidate {
    pub recipient_id: Uuid,
    pub follows_broadcaster: bool,
    pub preferences: NotificationPreferences,
}

#[async_trait]
pub trait NotificationRecipients: Send + Sync {
    async fn live_start_recipients(
        &self,
        broadcaster_id: Uuid,
    ) -> Result<Vec<NotificationCandidate>>;
}

#[derive(Debug, Default)]
pub struct NoRecipients;

#[async_trait]
impl NotificationRecipients for NoRecipients {
    async fn live_start_recipients(
        &self,
        _broadcaster_id: Uuid,
    ) -> Result<Vec<NotificationCandidate>> {
        Ok(Vec::new())
    }
}

pub struct LiveStartNotifier {
    recipients: Arc<dyn NotificationRecipients>,
    publisher: Arc<dyn LiveEventPublisher>,
}

impl LiveStartNotifier {
    pub fn new(
        recipients: Arc<dyn NotificationRecipients>,
        publisher: Arc<dyn LiveEventPublisher>,
    ) -> Self {
        Self {
            recipients,
            publisher,
        }
    }

    /// Returns how many notification requests were published
    pub async fn notify(&self, stream: &Stream, now: DateTime<Utc>) -> usize {
        let candidates = match self.recipients.live_start_recipients(stream.broadcaster_id).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(stream_id = %stream.id, error = %e, "Failed to load live-start recipients");
                return 0;
            }
        };

        let mut sent = 0;
        for candidate in candidates {
            if !should_notify_live_start(&candidate.preferences, candidate.follows_broadcaster, now)
            {
                continue;
            }
            let event = LiveEvent::LiveStartNotification {
                recipient_id: candidate.recipient_id,
                stream_id: stream.id,
                broadcaster_id: stream.broadcaster_id,
                title: stream.title.clone(),
            };
            publish_best_effort(self.publisher.as_ref(), &event).await;
            sent += 1;
        }

        debug!(stream_id = %stream.id, sent, "Live-start notifications dispatched");
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 30, hour, 15, 0).unwrap()
    }

    #[test]
    fn test_disabled_channels_suppress() {
        let prefs = NotificationPreferences {
            push_enabled: false,
            ..Default::default()
        };
        assert!(!should_notify_live_start(&prefs, true, at_hour(12)));

        let prefs = NotificationPreferences {
            live_stream_enabled: false,
            ..Default::default()
        };
        assert!(!should_notify_live_start(&prefs, true, at_hour(12)));
    }

    #[test]
    fn test_follow_only() {
        let prefs = NotificationPreferences {
            follow_only: true,
            ..Default::default()
        };
        assert!(!should_notify_live_start(&prefs, false, at_hour(12)));
        assert!(should_notify_live_start(&prefs, true, at_hour(12)));
    }

    #[test]
    fn test_quiet_hours_wrap_midnight() {
        let prefs = NotificationPreferences {
            quiet_hours: Some(QuietHours {
                start_hour: 22,
                end_hour: 7,
            }),
            ..Default::default()
        };
        assert!(!should_notify_live_start(&prefs, true, at_hour(23)));
        assert!(!should_notify_live_start(&prefs, true, at_hour(3)));
        assert!(should_notify_live_start(&prefs, true, at_hour(7)));
        assert!(should_notify_live_start(&prefs, true, at_hour(21)));
    }

    #[test]
    fn test_quiet_hours_same_day() {
        let quiet = QuietHours {
            start_hour: 9,
            end_hour: 17,
        };
        assert!(quiet.contains(9));
        assert!(quiet.contains(16));
        assert!(!quiet.contains(17));
        assert!(!quiet.contains(8));

        let empty = QuietHours {
            start_hour: 5,
            end_hour: 5,
        };
        assert!(!empty.contains(5));
    }

    #[test]
    fn test_event_payload_tag() {
        let event = LiveEvent::LiveStartNotification {
            recipient_id: Uuid::nil(),
            stream_id: Uuid::nil(),
            broadcaster_id: Uuid::nil(),
            title: "launch".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "notification.live_start");
        assert_eq!(value["title"], "launch");
    }
}
