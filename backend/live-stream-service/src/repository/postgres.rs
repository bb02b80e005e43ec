use super::{
    ChatRepository, FeaturedProductRepository, ReactionRepository, StreamRepository,
    ViewerSessionRepository,
};
use crate::error::{AppError, Result};
use crate::models::{
    ChatFilter, ChatMessage, ChatStats, FeatureInsert, FeaturedProduct, ProductEvent,
    QualityReport, Reaction, Stream, StreamFilter, StreamPatch, StreamStatus, ViewerSession,
    ModerationStatus,
};
use crate::services::retention::EPHEMERAL_TTL_SECONDS;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

const STREAM_COLUMNS: &str = "id, broadcaster_id, stream_type, broadcaster_kyc_tier, title, \
    description, thumbnail_url, privacy_setting, language, tags, status, stream_key, session_id, \
    viewer_count, peak_viewer_count, max_capacity, scheduled_start_time, actual_start_time, \
    end_time, recording_url, recording_status, recording_expiry_date, created_at, updated_at";

const CHAT_COLUMNS: &str = "id, stream_id, sender_id, sender_display_name, message, message_type, \
    moderation_status, created_at, expires_at";

const FEATURE_COLUMNS: &str = "id, stream_id, product_id, featured_at, unfeatured_at, \
    display_position, display_priority, view_count, click_count, purchase_count, revenue_generated";

const SESSION_COLUMNS: &str = "id, stream_id, viewer_id, viewer_identity, joined_at, left_at, \
    watch_duration_seconds, peak_quality_layer, rebuffer_events, rebuffer_duration_ms, viewer_ip, \
    viewer_country, device_type";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_column<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse::<T>().map_err(AppError::Internal)
}

#[derive(FromRow)]
struct StreamRow {
    id: Uuid,
    broadcaster_id: Uuid,
    stream_type: String,
    broadcaster_kyc_tier: i16,
    title: String,
    description: Option<String>,
    thumbnail_url: Option<String>,
    privacy_setting: String,
    language: Option<String>,
    tags: Vec<String>,
    status: String,
    stream_key: String,
    session_id: String,
    viewer_count: i64,
    peak_viewer_count: i64,
    max_capacity: i64,
    scheduled_start_time: Option<DateTime<Utc>>,
    actual_start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    recording_url: Option<String>,
    recording_status: Option<String>,
    recording_expiry_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StreamRow> for Stream {
    type Error = AppError;

    fn try_from(row: StreamRow) -> Result<Self> {
        Ok(Stream {
            id: row.id,
            broadcaster_id: row.broadcaster_id,
            stream_type: parse_column(&row.stream_type)?,
            broadcaster_kyc_tier: row.broadcaster_kyc_tier,
            title: row.title,
            description: row.description,
            thumbnail_url: row.thumbnail_url,
            privacy_setting: parse_column(&row.privacy_setting)?,
            language: row.language,
            tags: row.tags,
            status: parse_column(&row.status)?,
            stream_key: row.stream_key,
            session_id: row.session_id,
            viewer_count: row.viewer_count,
            peak_viewer_count: row.peak_viewer_count,
            max_capacity: row.max_capacity,
            scheduled_start_time: row.scheduled_start_time,
            actual_start_time: row.actual_start_time,
            end_time: row.end_time,
            recording_url: row.recording_url,
            recording_status: row
                .recording_status
                .as_deref()
                .map(parse_column)
                .transpose()?,
            recording_expiry_date: row.recording_expiry_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ChatRow {
    id: Uuid,
    stream_id: Uuid,
    sender_id: Option<Uuid>,
    sender_display_name: String,
    message: String,
    message_type: String,
    moderation_status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<ChatRow> for ChatMessage {
    type Error = AppError;

    fn try_from(row: ChatRow) -> Result<Self> {
        Ok(ChatMessage {
            id: row.id,
            stream_id: row.stream_id,
            sender_id: row.sender_id,
            sender_display_name: row.sender_display_name,
            message: row.message,
            message_type: parse_column(&row.message_type)?,
            moderation_status: parse_column(&row.moderation_status)?,
            created_at: row.created_at,
            expires_at: row.expires_at,
            ttl_seconds: EPHEMERAL_TTL_SECONDS,
        })
    }
}

#[derive(FromRow)]
struct FeatureRow {
    id: Uuid,
    stream_id: Uuid,
    product_id: Uuid,
    featured_at: DateTime<Utc>,
    unfeatured_at: Option<DateTime<Utc>>,
    display_position: i32,
    display_priority: i32,
    view_count: i64,
    click_count: i64,
    purchase_count: i64,
    revenue_generated: f64,
}

impl From<FeatureRow> for FeaturedProduct {
    fn from(row: FeatureRow) -> Self {
        FeaturedProduct {
            id: row.id,
            stream_id: row.stream_id,
            product_id: row.product_id,
            featured_at: row.featured_at,
            unfeatured_at: row.unfeatured_at,
            display_position: row.display_position,
            display_priority: row.display_priority,
            view_count: row.view_count,
            click_count: row.click_count,
            purchase_count: row.purchase_count,
            revenue_generated: row.revenue_generated,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    stream_id: Uuid,
    viewer_id: Option<Uuid>,
    viewer_identity: String,
    joined_at: DateTime<Utc>,
    left_at: Option<DateTime<Utc>>,
    watch_duration_seconds: Option<i64>,
    peak_quality_layer: Option<String>,
    rebuffer_events: i32,
    rebuffer_duration_ms: i64,
    viewer_ip: Option<String>,
    viewer_country: Option<String>,
    device_type: Option<String>,
}

impl TryFrom<SessionRow> for ViewerSession {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(ViewerSession {
            id: row.id,
            stream_id: row.stream_id,
            viewer_id: row.viewer_id,
            viewer_identity: row.viewer_identity,
            joined_at: row.joined_at,
            left_at: row.left_at,
            watch_duration_seconds: row.watch_duration_seconds,
            peak_quality_layer: row
                .peak_quality_layer
                .as_deref()
                .map(parse_column)
                .transpose()?,
            rebuffer_events: row.rebuffer_events,
            rebuffer_duration_ms: row.rebuffer_duration_ms,
            viewer_ip: row.viewer_ip,
            viewer_country: row.viewer_country,
            device_type: row.device_type,
        })
    }
}

fn into_streams(rows: Vec<StreamRow>) -> Result<Vec<Stream>> {
    rows.into_iter().map(Stream::try_from).collect()
}

#[async_trait]
impl StreamRepository for PgStore {
    async fn insert_stream(&self, stream: Stream) -> Result<Stream> {
        let row = sqlx::query_as::<_, StreamRow>(&format!(
            r#"
            INSERT INTO live_streams ({STREAM_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24)
            RETURNING {STREAM_COLUMNS}
            "#
        ))
        .bind(stream.id)
        .bind(stream.broadcaster_id)
        .bind(stream.stream_type.as_str())
        .bind(stream.broadcaster_kyc_tier)
        .bind(&stream.title)
        .bind(&stream.description)
        .bind(&stream.thumbnail_url)
        .bind(stream.privacy_setting.as_str())
        .bind(&stream.language)
        .bind(&stream.tags)
        .bind(stream.status.as_str())
        .bind(&stream.stream_key)
        .bind(&stream.session_id)
        .bind(stream.viewer_count)
        .bind(stream.peak_viewer_count)
        .bind(stream.max_capacity)
        .bind(stream.scheduled_start_time)
        .bind(stream.actual_start_time)
        .bind(stream.end_time)
        .bind(&stream.recording_url)
        .bind(stream.recording_status.map(|s| s.as_str()))
        .bind(stream.recording_expiry_date)
        .bind(stream.created_at)
        .bind(stream.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Stream::try_from(row)
    }

    async fn get_stream(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let row = sqlx::query_as::<_, StreamRow>(&format!(
            "SELECT {STREAM_COLUMNS} FROM live_streams WHERE id = $1"
        ))
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Stream::try_from).transpose()
    }

    async fn list_streams(&self, filter: &StreamFilter) -> Result<(Vec<Stream>, i64)> {
        let status = filter.status.map(|s| s.as_str());
        let stream_type = filter.stream_type.map(|t| t.as_str());

        let rows = sqlx::query_as::<_, StreamRow>(&format!(
            r#"
            SELECT {STREAM_COLUMNS}
            FROM live_streams
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR stream_type = $2)
              AND ($3::uuid IS NULL OR broadcaster_id = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(status)
        .bind(stream_type)
        .bind(filter.broadcaster_id)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM live_streams
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR stream_type = $2)
              AND ($3::uuid IS NULL OR broadcaster_id = $3)
            "#,
        )
        .bind(status)
        .bind(stream_type)
        .bind(filter.broadcaster_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((into_streams(rows)?, total))
    }

    async fn update_stream_details(
        &self,
        stream_id: Uuid,
        expected_status: StreamStatus,
        patch: &StreamPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Stream>> {
        let row = sqlx::query_as::<_, StreamRow>(&format!(
            r#"
            UPDATE live_streams
            SET title = COALESCE($3, title),
                description = COALESCE($4, description),
                thumbnail_url = COALESCE($5, thumbnail_url),
                privacy_setting = COALESCE($6, privacy_setting),
                scheduled_start_time = COALESCE($7, scheduled_start_time),
                updated_at = $8
            WHERE id = $1 AND status = $2
            RETURNING {STREAM_COLUMNS}
            "#
        ))
        .bind(stream_id)
        .bind(expected_status.as_str())
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.thumbnail_url)
        .bind(patch.privacy_setting.map(|p| p.as_str()))
        .bind(patch.scheduled_start_time)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Stream::try_from).transpose()
    }

    async fn mark_live(
        &self,
        stream_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<Option<Stream>> {
        let row = sqlx::query_as::<_, StreamRow>(&format!(
            r#"
            UPDATE live_streams
            SET status = 'live', actual_start_time = $2, updated_at = $2
            WHERE id = $1 AND status = 'scheduled'
            RETURNING {STREAM_COLUMNS}
            "#
        ))
        .bind(stream_id)
        .bind(started_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Stream::try_from).transpose()
    }

    async fn mark_ended(
        &self,
        stream_id: Uuid,
        ended_at: DateTime<Utc>,
        recording_expiry: DateTime<Utc>,
    ) -> Result<Option<Stream>> {
        let row = sqlx::query_as::<_, StreamRow>(&format!(
            r#"
            UPDATE live_streams
            SET status = 'ended',
                end_time = $2,
                viewer_count = 0,
                recording_status = 'processing',
                recording_expiry_date = $3,
                updated_at = $2
            WHERE id = $1 AND status = 'live'
            RETURNING {STREAM_COLUMNS}
            "#
        ))
        .bind(stream_id)
        .bind(ended_at)
        .bind(recording_expiry)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Stream::try_from).transpose()
    }

    async fn increment_viewers(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let row = sqlx::query_as::<_, StreamRow>(&format!(
            r#"
            UPDATE live_streams
            SET viewer_count = viewer_count + 1,
                peak_viewer_count = GREATEST(peak_viewer_count, viewer_count + 1)
            WHERE id = $1 AND status = 'live' AND viewer_count < max_capacity
            RETURNING {STREAM_COLUMNS}
            "#
        ))
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Stream::try_from).transpose()
    }

    async fn decrement_viewers(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let row = sqlx::query_as::<_, StreamRow>(&format!(
            r#"
            UPDATE live_streams
            SET viewer_count = GREATEST(viewer_count - 1, 0)
            WHERE id = $1 AND status = 'live'
            RETURNING {STREAM_COLUMNS}
            "#
        ))
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Stream::try_from).transpose()
    }
}

#[async_trait]
impl ChatRepository for PgStore {
    async fn insert_chat_message(&self, message: ChatMessage) -> Result<ChatMessage> {
        let row = sqlx::query_as::<_, ChatRow>(&format!(
            r#"
            INSERT INTO live_chat_messages ({CHAT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(message.id)
        .bind(message.stream_id)
        .bind(message.sender_id)
        .bind(&message.sender_display_name)
        .bind(&message.message)
        .bind(message.message_type.as_str())
        .bind(message.moderation_status.as_str())
        .bind(message.created_at)
        .bind(message.expires_at)
        .fetch_one(&self.pool)
        .await?;

        ChatMessage::try_from(row)
    }

    async fn get_chat_message(
        &self,
        stream_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<ChatMessage>> {
        let row = sqlx::query_as::<_, ChatRow>(&format!(
            "SELECT {CHAT_COLUMNS} FROM live_chat_messages WHERE id = $1 AND stream_id = $2"
        ))
        .bind(message_id)
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChatMessage::try_from).transpose()
    }

    async fn list_chat_messages(
        &self,
        stream_id: Uuid,
        filter: &ChatFilter,
    ) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatRow>(&format!(
            r#"
            SELECT {CHAT_COLUMNS}
            FROM live_chat_messages
            WHERE stream_id = $1
              AND (($2::text IS NULL AND moderation_status <> 'removed')
                   OR moderation_status = $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
              AND ($4::timestamptz IS NULL OR created_at > $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#
        ))
        .bind(stream_id)
        .bind(filter.moderation_status.map(|s| s.as_str()))
        .bind(filter.before)
        .bind(filter.after)
        .bind(filter.limit + 1)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn set_moderation_status(
        &self,
        stream_id: Uuid,
        message_id: Uuid,
        status: ModerationStatus,
    ) -> Result<Option<ChatMessage>> {
        let row = sqlx::query_as::<_, ChatRow>(&format!(
            r#"
            UPDATE live_chat_messages
            SET moderation_status = $3
            WHERE id = $1 AND stream_id = $2 AND moderation_status <> 'removed'
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(message_id)
        .bind(stream_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChatMessage::try_from).transpose()
    }

    async fn chat_stats(&self, stream_id: Uuid) -> Result<ChatStats> {
        let (total_messages, unique_chatters): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(DISTINCT sender_id)
            FROM live_chat_messages
            WHERE stream_id = $1
            "#,
        )
        .bind(stream_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ChatStats {
            total_messages,
            unique_chatters,
        })
    }
}

#[async_trait]
impl ReactionRepository for PgStore {
    async fn insert_reaction(&self, reaction: Reaction) -> Result<Reaction> {
        sqlx::query(
            r#"
            INSERT INTO live_reactions (id, stream_id, viewer_id, reaction_type, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reaction.id)
        .bind(reaction.stream_id)
        .bind(reaction.viewer_id)
        .bind(&reaction.reaction_type)
        .bind(reaction.created_at)
        .bind(reaction.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(reaction)
    }

    async fn reaction_counts(&self, stream_id: Uuid) -> Result<BTreeMap<String, u64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT reaction_type, COUNT(*)
            FROM live_reactions
            WHERE stream_id = $1
            GROUP BY reaction_type
            "#,
        )
        .bind(stream_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(reaction_type, count)| (reaction_type, count.max(0) as u64))
            .collect())
    }
}

#[async_trait]
impl FeaturedProductRepository for PgStore {
    async fn insert_featured_product(
        &self,
        feature: FeaturedProduct,
        max_active: usize,
    ) -> Result<FeatureInsert> {
        let mut tx = self.pool.begin().await?;

        // stream row lock serializes concurrent feature requests for one stream
        sqlx::query("SELECT id FROM live_streams WHERE id = $1 FOR UPDATE")
            .bind(feature.stream_id)
            .fetch_optional(&mut *tx)
            .await?;

        let current: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM live_featured_products WHERE stream_id = $1 AND unfeatured_at IS NULL",
        )
        .bind(feature.stream_id)
        .fetch_one(&mut *tx)
        .await?;

        let current = current.max(0) as usize;
        if current >= max_active {
            tx.rollback().await?;
            return Ok(FeatureInsert::AtCapacity { current });
        }

        let row = sqlx::query_as::<_, FeatureRow>(&format!(
            r#"
            INSERT INTO live_featured_products ({FEATURE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {FEATURE_COLUMNS}
            "#
        ))
        .bind(feature.id)
        .bind(feature.stream_id)
        .bind(feature.product_id)
        .bind(feature.featured_at)
        .bind(feature.unfeatured_at)
        .bind(feature.display_position)
        .bind(feature.display_priority)
        .bind(feature.view_count)
        .bind(feature.click_count)
        .bind(feature.purchase_count)
        .bind(feature.revenue_generated)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(FeatureInsert::Inserted(row.into()))
    }

    async fn list_featured_products(
        &self,
        stream_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<FeaturedProduct>> {
        let rows = sqlx::query_as::<_, FeatureRow>(&format!(
            r#"
            SELECT {FEATURE_COLUMNS}
            FROM live_featured_products
            WHERE stream_id = $1 AND ($2 OR unfeatured_at IS NULL)
            ORDER BY featured_at ASC
            "#
        ))
        .bind(stream_id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeaturedProduct::from).collect())
    }

    async fn unfeature_product(
        &self,
        stream_id: Uuid,
        feature_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FeaturedProduct>> {
        let row = sqlx::query_as::<_, FeatureRow>(&format!(
            r#"
            UPDATE live_featured_products
            SET unfeatured_at = $3
            WHERE id = $1 AND stream_id = $2 AND unfeatured_at IS NULL
            RETURNING {FEATURE_COLUMNS}
            "#
        ))
        .bind(feature_id)
        .bind(stream_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeaturedProduct::from))
    }

    async fn record_product_event(
        &self,
        stream_id: Uuid,
        feature_id: Uuid,
        event: ProductEvent,
    ) -> Result<Option<FeaturedProduct>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, FeatureRow>(&format!(
            r#"
            SELECT {FEATURE_COLUMNS}
            FROM live_featured_products
            WHERE id = $1 AND stream_id = $2 AND unfeatured_at IS NULL
            FOR UPDATE
            "#
        ))
        .bind(feature_id)
        .bind(stream_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut feature = FeaturedProduct::from(row);
        if let Err(e) = feature.apply_event(event) {
            tx.rollback().await?;
            return Err(e);
        }

        sqlx::query(
            r#"
            UPDATE live_featured_products
            SET view_count = $2, click_count = $3, purchase_count = $4, revenue_generated = $5
            WHERE id = $1
            "#,
        )
        .bind(feature.id)
        .bind(feature.view_count)
        .bind(feature.click_count)
        .bind(feature.purchase_count)
        .bind(feature.revenue_generated)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(feature))
    }
}

#[async_trait]
impl ViewerSessionRepository for PgStore {
    async fn insert_session(&self, session: ViewerSession) -> Result<ViewerSession> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            INSERT INTO live_viewer_sessions ({SESSION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session.id)
        .bind(session.stream_id)
        .bind(session.viewer_id)
        .bind(&session.viewer_identity)
        .bind(session.joined_at)
        .bind(session.left_at)
        .bind(session.watch_duration_seconds)
        .bind(session.peak_quality_layer.map(|q| q.as_str()))
        .bind(session.rebuffer_events)
        .bind(session.rebuffer_duration_ms)
        .bind(&session.viewer_ip)
        .bind(&session.viewer_country)
        .bind(&session.device_type)
        .fetch_one(&self.pool)
        .await?;

        ViewerSession::try_from(row)
    }

    async fn get_session(
        &self,
        stream_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<ViewerSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM live_viewer_sessions WHERE id = $1 AND stream_id = $2"
        ))
        .bind(session_id)
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ViewerSession::try_from).transpose()
    }

    async fn update_session_quality(
        &self,
        stream_id: Uuid,
        session_id: Uuid,
        report: &QualityReport,
    ) -> Result<Option<ViewerSession>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM live_viewer_sessions
            WHERE id = $1 AND stream_id = $2 AND left_at IS NULL
            FOR UPDATE
            "#
        ))
        .bind(session_id)
        .bind(stream_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut session = ViewerSession::try_from(row)?;
        session.apply_quality(report)?;

        sqlx::query(
            r#"
            UPDATE live_viewer_sessions
            SET peak_quality_layer = $2, rebuffer_events = $3, rebuffer_duration_ms = $4
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(session.peak_quality_layer.map(|q| q.as_str()))
        .bind(session.rebuffer_events)
        .bind(session.rebuffer_duration_ms)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(session))
    }

    async fn close_session(
        &self,
        stream_id: Uuid,
        session_id: Uuid,
        left_at: DateTime<Utc>,
    ) -> Result<Option<ViewerSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            UPDATE live_viewer_sessions
            SET left_at = $3,
                watch_duration_seconds = GREATEST(EXTRACT(EPOCH FROM ($3 - joined_at))::BIGINT, 0)
            WHERE id = $1 AND stream_id = $2 AND left_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(stream_id)
        .bind(left_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ViewerSession::try_from).transpose()
    }

    async fn close_open_sessions(&self, stream_id: Uuid, left_at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE live_viewer_sessions
            SET left_at = $2,
                watch_duration_seconds = GREATEST(EXTRACT(EPOCH FROM ($2 - joined_at))::BIGINT, 0)
            WHERE stream_id = $1 AND left_at IS NULL
            "#,
        )
        .bind(stream_id)
        .bind(left_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_sessions(&self, stream_id: Uuid) -> Result<Vec<ViewerSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM live_viewer_sessions WHERE stream_id = $1 ORDER BY joined_at ASC"
        ))
        .bind(stream_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ViewerSession::try_from).collect()
    }
}
