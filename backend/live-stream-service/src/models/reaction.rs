use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub stream_id: Uuid,
    pub viewer_id: Option<Uuid>,
    pub reaction_type: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Running reaction totals for one stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionAggregation {
    pub total_reactions: u64,
    pub reaction_counts: BTreeMap<String, u64>,
}

impl ReactionAggregation {
    pub fn from_counts(reaction_counts: BTreeMap<String, u64>) -> Self {
        let total_reactions = reaction_counts.values().sum();
        Self {
            total_reactions,
            reaction_counts,
        }
    }

    pub fn record(&mut self, reaction_type: &str) {
        self.total_reactions += 1;
        *self
            .reaction_counts
            .entry(reaction_type.to_string())
            .or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionReceipt {
    #[serde(flatten)]
    pub reaction: Reaction,
    pub aggregation: ReactionAggregation,
}
