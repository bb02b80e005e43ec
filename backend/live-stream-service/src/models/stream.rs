use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_MAX_CAPACITY: i64 = 50_000;

/// Minimum KYC tier a broadcaster needs to open a store (commerce) stream
pub const STORE_STREAM_MIN_KYC_TIER: i16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Store,
    Video,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Store => "store",
            StreamType::Video => "video",
        }
    }
}

impl FromStr for StreamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "store" => Ok(StreamType::Store),
            "video" => Ok(StreamType::Video),
            other => Err(format!("unknown stream type: {other}")),
        }
    }
}

/// Broadcast lifecycle. Only ever advances `Scheduled -> Live -> Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Scheduled,
    Live,
    Ended,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Scheduled => "scheduled",
            StreamStatus::Live => "live",
            StreamStatus::Ended => "ended",
        }
    }

    pub fn can_transition_to(&self, next: StreamStatus) -> bool {
        matches!(
            (self, next),
            (StreamStatus::Scheduled, StreamStatus::Live) | (StreamStatus::Live, StreamStatus::Ended)
        )
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(StreamStatus::Scheduled),
            "live" => Ok(StreamStatus::Live),
            "ended" => Ok(StreamStatus::Ended),
            other => Err(format!("unknown stream status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrivacySetting {
    #[default]
    Public,
    FollowersOnly,
    Private,
}

impl PrivacySetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacySetting::Public => "public",
            PrivacySetting::FollowersOnly => "followers_only",
            PrivacySetting::Private => "private",
        }
    }
}

impl FromStr for PrivacySetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(PrivacySetting::Public),
            "followers_only" => Ok(PrivacySetting::FollowersOnly),
            "private" => Ok(PrivacySetting::Private),
            other => Err(format!("unknown privacy setting: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Processing,
    Ready,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingStatus::Processing => "processing",
            RecordingStatus::Ready => "ready",
        }
    }
}

impl FromStr for RecordingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(RecordingStatus::Processing),
            "ready" => Ok(RecordingStatus::Ready),
            other => Err(format!("unknown recording status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub id: Uuid,
    pub broadcaster_id: Uuid,
    pub stream_type: StreamType,
    pub broadcaster_kyc_tier: i16,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub privacy_setting: PrivacySetting,
    pub language: Option<String>,
    pub tags: Vec<String>,
    pub status: StreamStatus,
    /// Ingest credential; blanked before the record leaves the owner's hands
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub stream_key: String,
    /// Opaque session identifier handed to the transport layer
    pub session_id: String,
    pub viewer_count: i64,
    pub peak_viewer_count: i64,
    pub max_capacity: i64,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub recording_url: Option<String>,
    pub recording_status: Option<RecordingStatus>,
    pub recording_expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stream {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.broadcaster_id == user_id
    }

    /// Strip owner-only fields for everyone but the broadcaster
    pub fn visible_to(mut self, viewer: Option<Uuid>) -> Self {
        if viewer != Some(self.broadcaster_id) {
            self.stream_key.clear();
        }
        self
    }

    pub fn duration_seconds(&self) -> i64 {
        match (self.actual_start_time, self.end_time) {
            (Some(start), Some(end)) => end.signed_duration_since(start).num_seconds().max(0),
            _ => 0,
        }
    }
}

/// Owner-editable fields. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub privacy_setting: Option<PrivacySetting>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
}

impl StreamPatch {
    /// Fields that may not change once the broadcast is live
    pub fn restricted_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.privacy_setting.is_some() {
            fields.push("privacy_setting");
        }
        if self.scheduled_start_time.is_some() {
            fields.push("scheduled_start_time");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        *self == StreamPatch::default()
    }

    pub fn apply(&self, stream: &mut Stream, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            stream.title = title.clone();
        }
        if let Some(description) = &self.description {
            stream.description = Some(description.clone());
        }
        if let Some(thumbnail_url) = &self.thumbnail_url {
            stream.thumbnail_url = Some(thumbnail_url.clone());
        }
        if let Some(privacy) = self.privacy_setting {
            stream.privacy_setting = privacy;
        }
        if let Some(scheduled) = self.scheduled_start_time {
            stream.scheduled_start_time = Some(scheduled);
        }
        stream.updated_at = now;
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamFilter {
    pub status: Option<StreamStatus>,
    pub stream_type: Option<StreamType>,
    pub broadcaster_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

impl StreamFilter {
    pub fn matches(&self, stream: &Stream) -> bool {
        self.status.map_or(true, |s| stream.status == s)
            && self.stream_type.map_or(true, |t| stream.stream_type == t)
            && self.broadcaster_id.map_or(true, |b| stream.broadcaster_id == b)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamListResponse {
    pub streams: Vec<Stream>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordingMetadata {
    pub processing_status: RecordingStatus,
    pub duration_seconds: i64,
    pub retention_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndStreamResponse {
    pub stream: Stream,
    pub recording_metadata: RecordingMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_advances() {
        use StreamStatus::*;
        assert!(Scheduled.can_transition_to(Live));
        assert!(Live.can_transition_to(Ended));

        for (from, to) in [
            (Scheduled, Scheduled),
            (Scheduled, Ended),
            (Live, Scheduled),
            (Live, Live),
            (Ended, Scheduled),
            (Ended, Live),
            (Ended, Ended),
        ] {
            assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
        }
    }

    #[test]
    fn test_patch_restricted_fields() {
        let patch = StreamPatch {
            title: Some("new".into()),
            ..Default::default()
        };
        assert!(patch.restricted_fields().is_empty());

        let patch = StreamPatch {
            privacy_setting: Some(PrivacySetting::Private),
            scheduled_start_time: Some(Utc::now()),
            ..Default::default()
        };
        assert_eq!(
            patch.restricted_fields(),
            vec!["privacy_setting", "scheduled_start_time"]
        );
    }

    #[test]
    fn test_enum_round_trip_through_db_text() {
        for status in [StreamStatus::Scheduled, StreamStatus::Live, StreamStatus::Ended] {
            assert_eq!(status.as_str().parse::<StreamStatus>().unwrap(), status);
        }
        assert!("paused".parse::<StreamStatus>().is_err());
    }
}
