use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub const MAX_CHAT_MESSAGE_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Emoji,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Emoji => "emoji",
            MessageType::System => "system",
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "emoji" => Ok(MessageType::Emoji),
            "system" => Ok(MessageType::System),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Visible,
    Flagged,
    Removed,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Visible => "visible",
            ModerationStatus::Flagged => "flagged",
            ModerationStatus::Removed => "removed",
        }
    }
}

impl FromStr for ModerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visible" => Ok(ModerationStatus::Visible),
            "flagged" => Ok(ModerationStatus::Flagged),
            "removed" => Ok(ModerationStatus::Removed),
            other => Err(format!("unknown moderation status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub stream_id: Uuid,
    /// `None` for anonymous senders
    pub sender_id: Option<Uuid>,
    pub sender_display_name: String,
    pub message: String,
    pub message_type: MessageType,
    pub moderation_status: ModerationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ChatFilter {
    pub limit: i64,
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
    pub moderation_status: Option<ModerationStatus>,
}

impl ChatFilter {
    pub fn matches(&self, message: &ChatMessage) -> bool {
        let status_ok = match self.moderation_status {
            Some(status) => message.moderation_status == status,
            // removed messages stay hidden unless asked for explicitly
            None => message.moderation_status != ModerationStatus::Removed,
        };
        status_ok
            && self.before.map_or(true, |b| message.created_at < b)
            && self.after.map_or(true, |a| message.created_at > a)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatPage {
    pub messages: Vec<ChatMessage>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChatStats {
    pub total_messages: i64,
    pub unique_chatters: i64,
}
