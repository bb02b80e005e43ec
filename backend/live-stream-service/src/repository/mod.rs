//! Persistence seam for the live-stream engine
//!
//! Every mutation that guards an invariant (status transitions, viewer counts,
//! the featured-product cap, moderation status) is a single conditional
//! operation here, so the services never do an unsynchronized
//! read-modify-write. Two backends implement these traits: [`MemoryStore`]
//! (DashMap, per-entry exclusive sections) and [`PgStore`] (row-level
//! conditional `UPDATE`s and `SELECT ... FOR UPDATE`).

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::Result;
use crate::models::{
    ChatFilter, ChatMessage, ChatStats, FeatureInsert, FeaturedProduct, ModerationStatus,
    ProductEvent, QualityReport, Reaction, Stream, StreamFilter, StreamPatch, StreamStatus,
    ViewerSession,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

#[async_trait]
pub trait StreamRepository: Send + Sync {
    async fn insert_stream(&self, stream: Stream) -> Result<Stream>;

    async fn get_stream(&self, stream_id: Uuid) -> Result<Option<Stream>>;

    /// Returns the requested page (newest first) and the total match count
    async fn list_streams(&self, filter: &StreamFilter) -> Result<(Vec<Stream>, i64)>;

    /// Applies `patch` only while the stream is still in `expected_status`
    async fn update_stream_details(
        &self,
        stream_id: Uuid,
        expected_status: StreamStatus,
        patch: &StreamPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Stream>>;

    /// `scheduled -> live`; `None` when the stream was not scheduled
    async fn mark_live(&self, stream_id: Uuid, started_at: DateTime<Utc>)
        -> Result<Option<Stream>>;

    /// `live -> ended`; resets viewer_count and flags the recording as processing.
    /// `None` when the stream was not live.
    async fn mark_ended(
        &self,
        stream_id: Uuid,
        ended_at: DateTime<Utc>,
        recording_expiry: DateTime<Utc>,
    ) -> Result<Option<Stream>>;

    /// Increments viewer_count (raising the peak) while live and below capacity
    async fn increment_viewers(&self, stream_id: Uuid) -> Result<Option<Stream>>;

    /// Decrements viewer_count, saturating at zero, while live
    async fn decrement_viewers(&self, stream_id: Uuid) -> Result<Option<Stream>>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn insert_chat_message(&self, message: ChatMessage) -> Result<ChatMessage>;

    async fn get_chat_message(
        &self,
        stream_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<ChatMessage>>;

    /// Newest first, at most `filter.limit + 1` rows so callers can derive `has_more`
    async fn list_chat_messages(
        &self,
        stream_id: Uuid,
        filter: &ChatFilter,
    ) -> Result<Vec<ChatMessage>>;

    /// Sets the status unless the message is missing or already removed
    async fn set_moderation_status(
        &self,
        stream_id: Uuid,
        message_id: Uuid,
        status: ModerationStatus,
    ) -> Result<Option<ChatMessage>>;

    async fn chat_stats(&self, stream_id: Uuid) -> Result<ChatStats>;
}

#[async_trait]
pub trait ReactionRepository: Send + Sync {
    async fn insert_reaction(&self, reaction: Reaction) -> Result<Reaction>;

    async fn reaction_counts(&self, stream_id: Uuid) -> Result<BTreeMap<String, u64>>;
}

#[async_trait]
pub trait FeaturedProductRepository: Send + Sync {
    /// Counts active features and inserts in one exclusive section
    async fn insert_featured_product(
        &self,
        feature: FeaturedProduct,
        max_active: usize,
    ) -> Result<FeatureInsert>;

    async fn list_featured_products(
        &self,
        stream_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<FeaturedProduct>>;

    async fn unfeature_product(
        &self,
        stream_id: Uuid,
        feature_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FeaturedProduct>>;

    /// Bumps counters on an active feature
    async fn record_product_event(
        &self,
        stream_id: Uuid,
        feature_id: Uuid,
        event: ProductEvent,
    ) -> Result<Option<FeaturedProduct>>;
}

#[async_trait]
pub trait ViewerSessionRepository: Send + Sync {
    async fn insert_session(&self, session: ViewerSession) -> Result<ViewerSession>;

    async fn get_session(&self, stream_id: Uuid, session_id: Uuid)
        -> Result<Option<ViewerSession>>;

    async fn update_session_quality(
        &self,
        stream_id: Uuid,
        session_id: Uuid,
        report: &QualityReport,
    ) -> Result<Option<ViewerSession>>;

    /// Closes an open session; `None` if unknown or already closed
    async fn close_session(
        &self,
        stream_id: Uuid,
        session_id: Uuid,
        left_at: DateTime<Utc>,
    ) -> Result<Option<ViewerSession>>;

    async fn close_open_sessions(&self, stream_id: Uuid, left_at: DateTime<Utc>) -> Result<u64>;

    async fn list_sessions(&self, stream_id: Uuid) -> Result<Vec<ViewerSession>>;
}

/// Everything the engine needs from storage
pub trait LiveStore:
    StreamRepository
    + ChatRepository
    + ReactionRepository
    + FeaturedProductRepository
    + ViewerSessionRepository
{
}

impl<T> LiveStore for T where
    T: StreamRepository
        + ChatRepository
        + ReactionRepository
        + FeaturedProductRepository
        + ViewerSessionRepository
{
}
