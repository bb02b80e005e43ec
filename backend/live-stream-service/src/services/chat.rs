//! Chat ingestion and listing

use super::rate_limiter::{RateLimitAction, RateLimitKey, RateLimitPolicy, RateLimiter};
use super::retention::{ephemeral_expiry, EPHEMERAL_TTL_SECONDS};
use super::stream_registry::load_stream;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    Actor, ChatFilter, ChatMessage, ChatPage, ListChatQuery, MessageType, ModerationStatus,
    SendChatRequest, Stream, StreamStatus, DEFAULT_CHAT_PAGE_SIZE, MAX_CHAT_MESSAGE_CHARS,
};
use crate::repository::{ChatRepository, LiveStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

pub struct ChatService {
    store: Arc<dyn LiveStore>,
    limiter: Arc<dyn RateLimiter>,
    policy: RateLimitPolicy,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn LiveStore>,
        limiter: Arc<dyn RateLimiter>,
        policy: RateLimitPolicy,
    ) -> Self {
        Self {
            store,
            limiter,
            policy,
        }
    }

    /// Checks run in order: stream exists, stream live, length, message type,
    /// rate limit
    pub async fn send_message(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        request: SendChatRequest,
    ) -> Result<ChatMessage> {
        request.validate()?;
        let text = request.message.unwrap_or_default();

        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        if stream.status != StreamStatus::Live {
            return Err(AppError::Validation("stream not live".to_string()));
        }

        validate_message_text(&text)?;
        authorize_message_type(actor, &stream, request.message_type)?;

        let key = RateLimitKey::new(actor, stream_id, RateLimitAction::Chat);
        let decision = self.limiter.check(&key, self.policy).await;
        if !decision.allowed {
            metrics::record_rate_limited(key.action().as_str());
        }
        decision.into_result()?;

        let now = Utc::now();
        let message = ChatMessage {
            id: Uuid::new_v4(),
            stream_id,
            sender_id: actor.user_id(),
            sender_display_name: actor.display_name().to_string(),
            message: text,
            message_type: request.message_type,
            moderation_status: ModerationStatus::Visible,
            created_at: now,
            expires_at: ephemeral_expiry(now),
            ttl_seconds: EPHEMERAL_TTL_SECONDS,
        };

        let message = self.store.insert_chat_message(message).await?;
        metrics::record_interaction("chat");
        debug!(stream_id = %stream_id, message_id = %message.id, "Chat message stored");
        Ok(message)
    }

    pub async fn list_messages(&self, stream_id: Uuid, query: ListChatQuery) -> Result<ChatPage> {
        query.validate()?;
        load_stream(self.store.as_ref(), stream_id).await?;

        let filter = ChatFilter {
            limit: query.limit.unwrap_or(DEFAULT_CHAT_PAGE_SIZE),
            before: query.before_timestamp,
            after: query.after_timestamp,
            moderation_status: query.moderation_status,
        };

        let mut messages = self.store.list_chat_messages(stream_id, &filter).await?;
        let has_more = messages.len() as i64 > filter.limit;
        messages.truncate(filter.limit.max(0) as usize);

        Ok(ChatPage { messages, has_more })
    }
}

/// `system` messages speak for the stream, so only its broadcaster may post them
pub fn authorize_message_type(
    actor: &Actor,
    stream: &Stream,
    message_type: MessageType,
) -> Result<()> {
    if message_type == MessageType::System && !actor.is_user(stream.broadcaster_id) {
        return Err(AppError::Forbidden(
            "only the broadcaster may post system messages".to_string(),
        ));
    }
    Ok(())
}

/// 1..=500 characters, counted as Unicode scalar values; whitespace alone
/// counts as empty
pub fn validate_message_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }
    let chars = text.chars().count();
    if chars > MAX_CHAT_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "message must be at most {} characters (got {})",
            MAX_CHAT_MESSAGE_CHARS, chars
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_length_bounds() {
        assert!(validate_message_text("").is_err());
        assert!(validate_message_text("   ").is_err());
        assert!(validate_message_text("hi").is_ok());
        assert!(validate_message_text(&"a".repeat(500)).is_ok());
        assert!(validate_message_text(&"a".repeat(501)).is_err());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 500 multi-byte characters is still within the limit
        assert!(validate_message_text(&"é".repeat(500)).is_ok());
        assert!(validate_message_text(&"🎉".repeat(501)).is_err());
    }
}
