//! Chat moderation: flag, remove (soft) and restore messages

use super::stream_registry::load_stream;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{Actor, ChatMessage, ModerationStatus, Stream};
use crate::repository::{ChatRepository, LiveStore};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Broadcaster may moderate any message; a sender only their own
pub fn authorize_moderation(actor: &Actor, stream: &Stream, message: &ChatMessage) -> Result<()> {
    let user = actor.authenticated()?;
    if stream.is_owned_by(user.id) || message.sender_id == Some(user.id) {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "only the broadcaster or the message author can moderate this message".to_string(),
    ))
}

/// Missing and already-removed messages are both "not found"
pub fn removal_target(message: Option<ChatMessage>) -> Result<ChatMessage> {
    match message {
        Some(message) if message.moderation_status != ModerationStatus::Removed => Ok(message),
        _ => Err(AppError::NotFound("chat message".to_string())),
    }
}

pub struct ModerationService {
    store: Arc<dyn LiveStore>,
}

impl ModerationService {
    pub fn new(store: Arc<dyn LiveStore>) -> Self {
        Self { store }
    }

    /// Soft delete; the row stays until its TTL lapses
    pub async fn delete_message(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        message_id: Uuid,
    ) -> Result<ChatMessage> {
        self.set_status(actor, stream_id, message_id, ModerationStatus::Removed)
            .await
    }

    pub async fn set_status(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        message_id: Uuid,
        status: ModerationStatus,
    ) -> Result<ChatMessage> {
        actor.authenticated()?;
        let stream = load_stream(self.store.as_ref(), stream_id).await?;

        let existing = self.store.get_chat_message(stream_id, message_id).await?;
        let message = removal_target(existing)?;
        authorize_moderation(actor, &stream, &message)?;

        // conditional update: a concurrent removal wins and this call sees None
        let updated = self
            .store
            .set_moderation_status(stream_id, message_id, status)
            .await?
            .ok_or_else(|| AppError::NotFound("chat message".to_string()))?;

        metrics::record_moderation(status.as_str());
        info!(
            stream_id = %stream_id,
            message_id = %message_id,
            status = status.as_str(),
            moderator = %actor.identity(),
            "Chat message moderated"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthenticatedUser, MessageType, PrivacySetting, StreamStatus, StreamType};
    use chrono::Utc;

    fn user(id: Uuid) -> Actor {
        Actor::Authenticated(AuthenticatedUser {
            id,
            display_name: "user".into(),
            kyc_tier: 0,
        })
    }

    fn stream(broadcaster_id: Uuid) -> Stream {
        let now = Utc::now();
        Stream {
            id: Uuid::new_v4(),
            broadcaster_id,
            stream_type: StreamType::Video,
            broadcaster_kyc_tier: 0,
            title: "t".into(),
            description: None,
            thumbnail_url: None,
            privacy_setting: PrivacySetting::Public,
            language: None,
            tags: vec![],
            status: StreamStatus::Live,
            stream_key: String::new(),
            session_id: String::new(),
            viewer_count: 0,
            peak_viewer_count: 0,
            max_capacity: 10,
            scheduled_start_time: None,
            actual_start_time: Some(now),
            end_time: None,
            recording_url: None,
            recording_status: None,
            recording_expiry_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn message(stream_id: Uuid, sender_id: Option<Uuid>, status: ModerationStatus) -> ChatMessage {
        let now = Utc::now();
        ChatMessage {
            id: Uuid::new_v4(),
            stream_id,
            sender_id,
            sender_display_name: "sender".into(),
            message: "hello".into(),
            message_type: MessageType::Text,
            moderation_status: status,
            created_at: now,
            expires_at: now,
            ttl_seconds: 0,
        }
    }

    #[test]
    fn test_broadcaster_and_author_may_moderate() {
        let broadcaster = Uuid::new_v4();
        let author = Uuid::new_v4();
        let s = stream(broadcaster);
        let m = message(s.id, Some(author), ModerationStatus::Visible);

        assert!(authorize_moderation(&user(broadcaster), &s, &m).is_ok());
        assert!(authorize_moderation(&user(author), &s, &m).is_ok());
        assert!(matches!(
            authorize_moderation(&user(Uuid::new_v4()), &s, &m),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_anonymous_never_moderates() {
        let s = stream(Uuid::new_v4());
        let m = message(s.id, None, ModerationStatus::Visible);
        let anon = Actor::Anonymous {
            connection_id: "127.0.0.1".into(),
        };
        assert!(matches!(
            authorize_moderation(&anon, &s, &m),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_removed_message_is_not_a_target() {
        let s = stream(Uuid::new_v4());
        assert!(matches!(removal_target(None), Err(AppError::NotFound(_))));
        assert!(matches!(
            removal_target(Some(message(s.id, None, ModerationStatus::Removed))),
            Err(AppError::NotFound(_))
        ));
        assert!(removal_target(Some(message(s.id, None, ModerationStatus::Flagged))).is_ok());
    }
}
