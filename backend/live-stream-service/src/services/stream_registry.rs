//! Stream registry (business logic layer)
//!
//! Owns the `scheduled -> live -> ended` state machine, ownership and KYC
//! checks, and the partial-update policy. Transitions are compare-and-swap
//! operations in the store, so two concurrent starts produce one winner.

use super::notifications::{publish_best_effort, LiveEvent, LiveEventPublisher, LiveStartNotifier};
use super::retention::{recording_expiry, RETENTION_DAYS};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    Actor, AuthenticatedUser, CreateStreamRequest, EndStreamResponse, ListStreamsQuery,
    RecordingMetadata, RecordingStatus, Stream, StreamFilter, StreamListResponse, StreamPatch,
    StreamStatus, StreamType, UpdateStreamRequest, DEFAULT_MAX_CAPACITY,
    DEFAULT_STREAM_PAGE_SIZE, STORE_STREAM_MIN_KYC_TIER,
};
use crate::repository::{LiveStore, StreamRepository, ViewerSessionRepository};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

const STREAM_KEY_LENGTH: usize = 32;

/// Stream lookups shared by every service that acts on a stream
pub(crate) async fn load_stream(store: &dyn LiveStore, stream_id: Uuid) -> Result<Stream> {
    store
        .get_stream(stream_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("stream {}", stream_id)))
}

pub(crate) fn ensure_owner(stream: &Stream, user: &AuthenticatedUser) -> Result<()> {
    if stream.is_owned_by(user.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "only the broadcaster can modify this stream".to_string(),
        ))
    }
}

fn generate_stream_key() -> String {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STREAM_KEY_LENGTH)
        .map(char::from)
        .collect();
    format!("live_{}", secret)
}

pub struct StreamRegistry {
    store: Arc<dyn LiveStore>,
    events: Arc<dyn LiveEventPublisher>,
    notifier: Arc<LiveStartNotifier>,
    kyc_verification_url: String,
}

impl StreamRegistry {
    pub fn new(
        store: Arc<dyn LiveStore>,
        events: Arc<dyn LiveEventPublisher>,
        notifier: Arc<LiveStartNotifier>,
        kyc_verification_url: String,
    ) -> Self {
        Self {
            store,
            events,
            notifier,
            kyc_verification_url,
        }
    }

    /// Create a scheduled stream owned by the caller
    pub async fn create_stream(&self, actor: &Actor, request: CreateStreamRequest) -> Result<Stream> {
        let user = actor.authenticated()?;

        // KYC gate applies before any other field is looked at
        if request.stream_type == Some(StreamType::Store)
            && user.kyc_tier < STORE_STREAM_MIN_KYC_TIER
        {
            return Err(AppError::KycRequired {
                required: STORE_STREAM_MIN_KYC_TIER,
                current: user.kyc_tier,
                verification_url: self.kyc_verification_url.clone(),
            });
        }

        request.validate()?;
        let (Some(stream_type), Some(title)) = (request.stream_type, request.title) else {
            return Err(AppError::Validation("stream_type and title are required".to_string()));
        };

        let now = Utc::now();
        let stream = Stream {
            id: Uuid::new_v4(),
            broadcaster_id: user.id,
            stream_type,
            broadcaster_kyc_tier: user.kyc_tier,
            title,
            description: request.description,
            thumbnail_url: request.thumbnail_url,
            privacy_setting: request.privacy_setting.unwrap_or_default(),
            language: request.language,
            tags: request.tags,
            status: StreamStatus::Scheduled,
            stream_key: generate_stream_key(),
            session_id: format!("sess_{}", Uuid::new_v4().simple()),
            viewer_count: 0,
            peak_viewer_count: 0,
            max_capacity: DEFAULT_MAX_CAPACITY,
            scheduled_start_time: request.scheduled_start_time,
            actual_start_time: None,
            end_time: None,
            recording_url: None,
            recording_status: None,
            recording_expiry_date: None,
            created_at: now,
            updated_at: now,
        };

        let stream = self.store.insert_stream(stream).await?;
        metrics::record_stream_transition("created");
        info!(
            stream_id = %stream.id,
            broadcaster_id = %stream.broadcaster_id,
            stream_type = stream.stream_type.as_str(),
            "Stream created"
        );
        Ok(stream)
    }

    pub async fn get_stream(&self, actor: &Actor, stream_id: Uuid) -> Result<Stream> {
        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        Ok(stream.visible_to(actor.user_id()))
    }

    pub async fn list_streams(
        &self,
        actor: &Actor,
        query: ListStreamsQuery,
    ) -> Result<StreamListResponse> {
        query.validate()?;
        let filter = StreamFilter {
            status: query.status,
            stream_type: query.stream_type,
            broadcaster_id: query.broadcaster_id,
            limit: query.limit.unwrap_or(DEFAULT_STREAM_PAGE_SIZE),
            offset: query.offset.unwrap_or(0),
        };

        let (streams, total) = self.store.list_streams(&filter).await?;
        let viewer = actor.user_id();
        Ok(StreamListResponse {
            streams: streams.into_iter().map(|s| s.visible_to(viewer)).collect(),
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    /// Partial update; schedule and privacy are frozen while live
    pub async fn update_stream(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        request: UpdateStreamRequest,
    ) -> Result<Stream> {
        let user = actor.authenticated()?;
        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        ensure_owner(&stream, user)?;

        request.validate()?;
        let patch = StreamPatch::from(request);
        if patch.is_empty() {
            return Err(AppError::Validation("no updatable fields provided".to_string()));
        }

        if stream.status == StreamStatus::Live {
            let restricted = patch.restricted_fields();
            if !restricted.is_empty() {
                return Err(AppError::Validation(format!(
                    "{} cannot be changed while the stream is live",
                    restricted.join(", ")
                )));
            }
        }

        let updated = self
            .store
            .update_stream_details(stream_id, stream.status, &patch, Utc::now())
            .await?
            .ok_or_else(|| {
                AppError::Conflict("stream status changed during update, retry".to_string())
            })?;

        debug!(stream_id = %stream_id, "Stream details updated");
        Ok(updated)
    }

    /// `scheduled -> live`
    pub async fn start_stream(&self, actor: &Actor, stream_id: Uuid) -> Result<Stream> {
        let user = actor.authenticated()?;
        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        ensure_owner(&stream, user)?;

        if !stream.status.can_transition_to(StreamStatus::Live) {
            return Err(AppError::Conflict(format!(
                "stream is {}, only scheduled streams can start",
                stream.status
            )));
        }

        let now = Utc::now();
        let started = self
            .store
            .mark_live(stream_id, now)
            .await?
            .ok_or_else(|| AppError::Conflict("stream was already started".to_string()))?;

        metrics::record_stream_transition("started");
        info!(stream_id = %stream_id, broadcaster_id = %user.id, "Stream started");

        publish_best_effort(self.events.as_ref(), &LiveEvent::started(&started, now)).await;
        self.notifier.notify(&started, now).await;

        Ok(started)
    }

    /// `live -> ended`; closes open viewer sessions and schedules recording expiry
    pub async fn end_stream(&self, actor: &Actor, stream_id: Uuid) -> Result<EndStreamResponse> {
        let user = actor.authenticated()?;
        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        ensure_owner(&stream, user)?;

        if !stream.status.can_transition_to(StreamStatus::Ended) {
            return Err(AppError::Conflict(format!(
                "stream is {}, only live streams can end",
                stream.status
            )));
        }

        let ended_at = Utc::now();
        let ended = self
            .store
            .mark_ended(stream_id, ended_at, recording_expiry(ended_at))
            .await?
            .ok_or_else(|| AppError::Conflict("stream was already ended".to_string()))?;

        let closed = self.store.close_open_sessions(stream_id, ended_at).await?;

        metrics::record_stream_transition("ended");
        info!(
            stream_id = %stream_id,
            duration_seconds = ended.duration_seconds(),
            peak_viewers = ended.peak_viewer_count,
            closed_sessions = closed,
            "Stream ended"
        );

        publish_best_effort(self.events.as_ref(), &LiveEvent::ended(&ended)).await;

        let recording_metadata = RecordingMetadata {
            processing_status: ended
                .recording_status
                .unwrap_or(RecordingStatus::Processing),
            duration_seconds: ended.duration_seconds(),
            retention_days: RETENTION_DAYS,
        };

        Ok(EndStreamResponse {
            stream: ended,
            recording_metadata,
        })
    }
}
