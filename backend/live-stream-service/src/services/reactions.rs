//! Emoji reaction ingestion with a live per-stream tally
//!
//! The tally for a stream is seeded from the store the first time the stream
//! is touched and then kept in memory. Appends for one stream are serialized
//! through that stream's tally lock so the seed and the increments never
//! double count.

use super::rate_limiter::{RateLimitAction, RateLimitKey, RateLimitPolicy, RateLimiter};
use super::retention::ephemeral_expiry;
use super::stream_registry::load_stream;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    Actor, Reaction, ReactionAggregation, ReactionReceipt, SendReactionRequest, StreamType,
};
use crate::repository::{LiveStore, ReactionRepository};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

pub const MAX_REACTION_SCALARS: usize = 8;

type Tally = Arc<Mutex<Option<ReactionAggregation>>>;

pub struct ReactionService {
    store: Arc<dyn LiveStore>,
    limiter: Arc<dyn RateLimiter>,
    policy: RateLimitPolicy,
    tallies: DashMap<Uuid, Tally>,
}

impl ReactionService {
    pub fn new(
        store: Arc<dyn LiveStore>,
        limiter: Arc<dyn RateLimiter>,
        policy: RateLimitPolicy,
    ) -> Self {
        Self {
            store,
            limiter,
            policy,
            tallies: DashMap::new(),
        }
    }

    fn tally(&self, stream_id: Uuid) -> Tally {
        self.tallies.entry(stream_id).or_default().clone()
    }

    pub async fn send_reaction(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        request: SendReactionRequest,
    ) -> Result<ReactionReceipt> {
        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        if stream.stream_type != StreamType::Video {
            return Err(AppError::Validation(
                "reactions are only available on video streams".to_string(),
            ));
        }

        request.validate()?;
        let reaction_type = request.reaction.unwrap_or_default();
        validate_reaction_emoji(&reaction_type)?;

        let key = RateLimitKey::new(actor, stream_id, RateLimitAction::Reaction);
        let decision = self.limiter.check(&key, self.policy).await;
        if !decision.allowed {
            metrics::record_rate_limited(key.action().as_str());
        }
        decision.into_result()?;

        let now = Utc::now();
        let reaction = Reaction {
            id: Uuid::new_v4(),
            stream_id,
            viewer_id: actor.user_id(),
            reaction_type,
            created_at: now,
            expires_at: ephemeral_expiry(now),
        };

        let tally = self.tally(stream_id);
        let mut guard = tally.lock().await;
        if guard.is_none() {
            let counts = self.store.reaction_counts(stream_id).await?;
            *guard = Some(ReactionAggregation::from_counts(counts));
        }

        let reaction = self.store.insert_reaction(reaction).await?;
        let aggregation = guard.get_or_insert_with(ReactionAggregation::default);
        aggregation.record(&reaction.reaction_type);
        let aggregation = aggregation.clone();
        drop(guard);

        metrics::record_interaction("reaction");
        Ok(ReactionReceipt {
            reaction,
            aggregation,
        })
    }

    pub async fn summary(&self, stream_id: Uuid) -> Result<ReactionAggregation> {
        load_stream(self.store.as_ref(), stream_id).await?;

        let tally = self.tally(stream_id);
        let mut guard = tally.lock().await;
        if let Some(aggregation) = guard.as_ref() {
            return Ok(aggregation.clone());
        }
        let counts = self.store.reaction_counts(stream_id).await?;
        let aggregation = ReactionAggregation::from_counts(counts);
        *guard = Some(aggregation.clone());
        Ok(aggregation)
    }
}

fn is_emoji_base(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x2B50 | 0x2B55 | 0x2764
    )
}

fn is_emoji_component(c: char) -> bool {
    matches!(
        c as u32,
        // ZWJ, variation selectors, keycap
        0x200D | 0xFE0E | 0xFE0F | 0x20E3
        // regional indicators, tag sequence characters
        | 0x1F1E6..=0x1F1FF | 0xE0020..=0xE007F
    )
}

/// Non-empty, at most 8 scalars, allow-listed first scalar, emoji-only tail
pub fn validate_reaction_emoji(reaction: &str) -> Result<()> {
    let mut chars = reaction.chars();
    let Some(first) = chars.next() else {
        return Err(AppError::Validation("reaction must not be empty".to_string()));
    };

    if reaction.chars().count() > MAX_REACTION_SCALARS {
        return Err(AppError::Validation(format!(
            "reaction must be at most {} code points",
            MAX_REACTION_SCALARS
        )));
    }

    if !is_emoji_base(first) || !chars.all(|c| is_emoji_base(c) || is_emoji_component(c)) {
        return Err(AppError::Validation(format!(
            "unsupported reaction: {:?}",
            reaction
        )));
    }

    Ok(())
}
