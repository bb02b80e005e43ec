use super::{
    ChatRepository, FeaturedProductRepository, ReactionRepository, StreamRepository,
    ViewerSessionRepository,
};
use crate::error::Result;
use crate::models::{
    ChatFilter, ChatMessage, ChatStats, FeatureInsert, FeaturedProduct, ModerationStatus,
    ProductEvent, QualityReport, Reaction, RecordingStatus, Stream, StreamFilter, StreamPatch,
    StreamStatus, ViewerSession,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// Process-local store.
///
/// Records are grouped per stream; every conditional mutation happens while
/// holding that stream's map entry, which serializes writers on the same
/// stream without blocking other streams.
#[derive(Default)]
pub struct MemoryStore {
    streams: DashMap<Uuid, Stream>,
    chat: DashMap<Uuid, Vec<ChatMessage>>,
    reactions: DashMap<Uuid, Vec<Reaction>>,
    features: DashMap<Uuid, Vec<FeaturedProduct>>,
    sessions: DashMap<Uuid, Vec<ViewerSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamRepository for MemoryStore {
    async fn insert_stream(&self, stream: Stream) -> Result<Stream> {
        self.streams.insert(stream.id, stream.clone());
        Ok(stream)
    }

    async fn get_stream(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        Ok(self.streams.get(&stream_id).map(|s| s.clone()))
    }

    async fn list_streams(&self, filter: &StreamFilter) -> Result<(Vec<Stream>, i64)> {
        let mut matching: Vec<Stream> = self
            .streams
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_stream_details(
        &self,
        stream_id: Uuid,
        expected_status: StreamStatus,
        patch: &StreamPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Stream>> {
        let Some(mut stream) = self.streams.get_mut(&stream_id) else {
            return Ok(None);
        };
        if stream.status != expected_status {
            return Ok(None);
        }
        patch.apply(&mut stream, now);
        Ok(Some(stream.clone()))
    }

    async fn mark_live(
        &self,
        stream_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<Option<Stream>> {
        let Some(mut stream) = self.streams.get_mut(&stream_id) else {
            return Ok(None);
        };
        if stream.status != StreamStatus::Scheduled {
            return Ok(None);
        }
        stream.status = StreamStatus::Live;
        stream.actual_start_time = Some(started_at);
        stream.updated_at = started_at;
        Ok(Some(stream.clone()))
    }

    async fn mark_ended(
        &self,
        stream_id: Uuid,
        ended_at: DateTime<Utc>,
        recording_expiry: DateTime<Utc>,
    ) -> Result<Option<Stream>> {
        let Some(mut stream) = self.streams.get_mut(&stream_id) else {
            return Ok(None);
        };
        if stream.status != StreamStatus::Live {
            return Ok(None);
        }
        stream.status = StreamStatus::Ended;
        stream.end_time = Some(ended_at);
        stream.viewer_count = 0;
        stream.recording_status = Some(RecordingStatus::Processing);
        stream.recording_expiry_date = Some(recording_expiry);
        stream.updated_at = ended_at;
        Ok(Some(stream.clone()))
    }

    async fn increment_viewers(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let Some(mut stream) = self.streams.get_mut(&stream_id) else {
            return Ok(None);
        };
        if stream.status != StreamStatus::Live || stream.viewer_count >= stream.max_capacity {
            return Ok(None);
        }
        stream.viewer_count += 1;
        stream.peak_viewer_count = stream.peak_viewer_count.max(stream.viewer_count);
        Ok(Some(stream.clone()))
    }

    async fn decrement_viewers(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let Some(mut stream) = self.streams.get_mut(&stream_id) else {
            return Ok(None);
        };
        if stream.status != StreamStatus::Live {
            return Ok(None);
        }
        stream.viewer_count = (stream.viewer_count - 1).max(0);
        Ok(Some(stream.clone()))
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn insert_chat_message(&self, message: ChatMessage) -> Result<ChatMessage> {
        self.chat
            .entry(message.stream_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn get_chat_message(
        &self,
        stream_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<ChatMessage>> {
        Ok(self
            .chat
            .get(&stream_id)
            .and_then(|messages| messages.iter().find(|m| m.id == message_id).cloned()))
    }

    async fn list_chat_messages(
        &self,
        stream_id: Uuid,
        filter: &ChatFilter,
    ) -> Result<Vec<ChatMessage>> {
        let Some(messages) = self.chat.get(&stream_id) else {
            return Ok(Vec::new());
        };
        // insertion order is chronological
        Ok(messages
            .iter()
            .rev()
            .filter(|m| filter.matches(m))
            .take(filter.limit.max(0) as usize + 1)
            .cloned()
            .collect())
    }

    async fn set_moderation_status(
        &self,
        stream_id: Uuid,
        message_id: Uuid,
        status: ModerationStatus,
    ) -> Result<Option<ChatMessage>> {
        let Some(mut messages) = self.chat.get_mut(&stream_id) else {
            return Ok(None);
        };
        let Some(message) = messages
            .iter_mut()
            .find(|m| m.id == message_id && m.moderation_status != ModerationStatus::Removed)
        else {
            return Ok(None);
        };
        message.moderation_status = status;
        Ok(Some(message.clone()))
    }

    async fn chat_stats(&self, stream_id: Uuid) -> Result<ChatStats> {
        let Some(messages) = self.chat.get(&stream_id) else {
            return Ok(ChatStats::default());
        };
        let chatters: HashSet<Uuid> = messages.iter().filter_map(|m| m.sender_id).collect();
        Ok(ChatStats {
            total_messages: messages.len() as i64,
            unique_chatters: chatters.len() as i64,
        })
    }
}

#[async_trait]
impl ReactionRepository for MemoryStore {
    async fn insert_reaction(&self, reaction: Reaction) -> Result<Reaction> {
        self.reactions
            .entry(reaction.stream_id)
            .or_default()
            .push(reaction.clone());
        Ok(reaction)
    }

    async fn reaction_counts(&self, stream_id: Uuid) -> Result<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        if let Some(reactions) = self.reactions.get(&stream_id) {
            for reaction in reactions.iter() {
                *counts.entry(reaction.reaction_type.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl FeaturedProductRepository for MemoryStore {
    async fn insert_featured_product(
        &self,
        feature: FeaturedProduct,
        max_active: usize,
    ) -> Result<FeatureInsert> {
        let mut features = self.features.entry(feature.stream_id).or_default();
        let current = features.iter().filter(|f| f.is_active()).count();
        if current >= max_active {
            return Ok(FeatureInsert::AtCapacity { current });
        }
        features.push(feature.clone());
        Ok(FeatureInsert::Inserted(feature))
    }

    async fn list_featured_products(
        &self,
        stream_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<FeaturedProduct>> {
        Ok(self
            .features
            .get(&stream_id)
            .map(|features| {
                features
                    .iter()
                    .filter(|f| include_inactive || f.is_active())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn unfeature_product(
        &self,
        stream_id: Uuid,
        feature_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FeaturedProduct>> {
        let Some(mut features) = self.features.get_mut(&stream_id) else {
            return Ok(None);
        };
        let Some(feature) = features
            .iter_mut()
            .find(|f| f.id == feature_id && f.is_active())
        else {
            return Ok(None);
        };
        feature.unfeatured_at = Some(at);
        Ok(Some(feature.clone()))
    }

    async fn record_product_event(
        &self,
        stream_id: Uuid,
        feature_id: Uuid,
        event: ProductEvent,
    ) -> Result<Option<FeaturedProduct>> {
        let Some(mut features) = self.features.get_mut(&stream_id) else {
            return Ok(None);
        };
        let Some(feature) = features
            .iter_mut()
            .find(|f| f.id == feature_id && f.is_active())
        else {
            return Ok(None);
        };
        feature.apply_event(event)?;
        Ok(Some(feature.clone()))
    }
}

#[async_trait]
impl ViewerSessionRepository for MemoryStore {
    async fn insert_session(&self, session: ViewerSession) -> Result<ViewerSession> {
        self.sessions
            .entry(session.stream_id)
            .or_default()
            .push(session.clone());
        Ok(session)
    }

    async fn get_session(
        &self,
        stream_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<ViewerSession>> {
        Ok(self
            .sessions
            .get(&stream_id)
            .and_then(|sessions| sessions.iter().find(|s| s.id == session_id).cloned()))
    }

    async fn update_session_quality(
        &self,
        stream_id: Uuid,
        session_id: Uuid,
        report: &QualityReport,
    ) -> Result<Option<ViewerSession>> {
        let Some(mut sessions) = self.sessions.get_mut(&stream_id) else {
            return Ok(None);
        };
        let Some(session) = sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.is_open())
        else {
            return Ok(None);
        };
        session.apply_quality(report)?;
        Ok(Some(session.clone()))
    }

    async fn close_session(
        &self,
        stream_id: Uuid,
        session_id: Uuid,
        left_at: DateTime<Utc>,
    ) -> Result<Option<ViewerSession>> {
        let Some(mut sessions) = self.sessions.get_mut(&stream_id) else {
            return Ok(None);
        };
        let Some(session) = sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.is_open())
        else {
            return Ok(None);
        };
        session.close(left_at);
        Ok(Some(session.clone()))
    }

    async fn close_open_sessions(&self, stream_id: Uuid, left_at: DateTime<Utc>) -> Result<u64> {
        let Some(mut sessions) = self.sessions.get_mut(&stream_id) else {
            return Ok(0);
        };
        let mut closed = 0;
        for session in sessions.iter_mut().filter(|s| s.is_open()) {
            session.close(left_at);
            closed += 1;
        }
        Ok(closed)
    }

    async fn list_sessions(&self, stream_id: Uuid) -> Result<Vec<ViewerSession>> {
        Ok(self
            .sessions
            .get(&stream_id)
            .map(|s| s.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PrivacySetting, StreamType, DEFAULT_MAX_CAPACITY};
    use std::sync::Arc;

    fn scheduled_stream() -> Stream {
        let now = Utc::now();
        Stream {
            id: Uuid::new_v4(),
            broadcaster_id: Uuid::new_v4(),
            stream_type: StreamType::Video,
            broadcaster_kyc_tier: 0,
            title: "test".into(),
            description: None,
            thumbnail_url: None,
            privacy_setting: PrivacySetting::Public,
            language: None,
            tags: Vec::new(),
            status: StreamStatus::Scheduled,
            stream_key: "key".into(),
            session_id: "session".into(),
            viewer_count: 0,
            peak_viewer_count: 0,
            max_capacity: DEFAULT_MAX_CAPACITY,
            scheduled_start_time: None,
            actual_start_time: None,
            end_time: None,
            recording_url: None,
            recording_status: None,
            recording_expiry_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_concurrent_start_has_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let stream = store.insert_stream(scheduled_stream()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.mark_live(stream.id, Utc::now()).await.unwrap().is_some()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_viewer_counts_respect_capacity_and_floor() {
        let store = MemoryStore::new();
        let mut stream = scheduled_stream();
        stream.max_capacity = 2;
        let stream = store.insert_stream(stream).await.unwrap();
        store.mark_live(stream.id, Utc::now()).await.unwrap();

        assert!(store.increment_viewers(stream.id).await.unwrap().is_some());
        assert!(store.increment_viewers(stream.id).await.unwrap().is_some());
        assert!(store.increment_viewers(stream.id).await.unwrap().is_none());

        for _ in 0..3 {
            store.decrement_viewers(stream.id).await.unwrap();
        }
        let current = store.get_stream(stream.id).await.unwrap().unwrap();
        assert_eq!(current.viewer_count, 0);
        assert_eq!(current.peak_viewer_count, 2);
    }
}
