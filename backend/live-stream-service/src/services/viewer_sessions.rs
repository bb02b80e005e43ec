//! Viewer session tracking: join, quality reports, leave

use super::stream_registry::load_stream;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    Actor, JoinSessionRequest, QualityLayer, QualityReport, StreamStatus, ViewerSession,
};
use crate::repository::{LiveStore, StreamRepository, ViewerSessionRepository};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

pub struct ViewerSessionService {
    store: Arc<dyn LiveStore>,
}

impl ViewerSessionService {
    pub fn new(store: Arc<dyn LiveStore>) -> Self {
        Self { store }
    }

    pub async fn join(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        request: JoinSessionRequest,
        viewer_ip: Option<String>,
    ) -> Result<ViewerSession> {
        request.validate()?;
        let stream = load_stream(self.store.as_ref(), stream_id).await?;
        if stream.status != StreamStatus::Live {
            return Err(AppError::Validation("stream not live".to_string()));
        }

        if self.store.increment_viewers(stream_id).await?.is_none() {
            // re-read to tell "ended meanwhile" apart from "full"
            let current = load_stream(self.store.as_ref(), stream_id).await?;
            if current.status != StreamStatus::Live {
                return Err(AppError::Validation("stream not live".to_string()));
            }
            return Err(AppError::Conflict("stream at capacity".to_string()));
        }

        let session = ViewerSession {
            id: Uuid::new_v4(),
            stream_id,
            viewer_id: actor.user_id(),
            viewer_identity: actor.identity(),
            joined_at: Utc::now(),
            left_at: None,
            watch_duration_seconds: None,
            peak_quality_layer: request.quality_layer,
            rebuffer_events: 0,
            rebuffer_duration_ms: 0,
            viewer_ip,
            viewer_country: request.viewer_country.map(|c| c.to_ascii_uppercase()),
            device_type: request.device_type,
        };

        match self.store.insert_session(session).await {
            Ok(session) => {
                metrics::record_viewer_session("join");
                debug!(stream_id = %stream_id, session_id = %session.id, "Viewer joined");
                Ok(session)
            }
            Err(e) => {
                if let Err(undo) = self.store.decrement_viewers(stream_id).await {
                    warn!(stream_id = %stream_id, error = %undo, "Failed to roll back viewer count");
                }
                Err(e)
            }
        }
    }

    /// Sessions are only touched by the identity that opened them
    async fn ensure_session_owner(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        session_id: Uuid,
    ) -> Result<()> {
        let session = self
            .store
            .get_session(stream_id, session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("open session {}", session_id)))?;
        if session.viewer_identity != actor.identity() {
            return Err(AppError::Forbidden(
                "session belongs to another viewer".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn report_quality(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        session_id: Uuid,
        report: QualityReport,
    ) -> Result<ViewerSession> {
        self.ensure_session_owner(actor, stream_id, session_id).await?;
        self.store
            .update_session_quality(stream_id, session_id, &report)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("open session {}", session_id)))
    }

    pub async fn leave(
        &self,
        actor: &Actor,
        stream_id: Uuid,
        session_id: Uuid,
    ) -> Result<ViewerSession> {
        self.ensure_session_owner(actor, stream_id, session_id).await?;
        let session = self
            .store
            .close_session(stream_id, session_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("open session {}", session_id)))?;

        // no-op once the stream has ended; end already reset the count
        self.store.decrement_viewers(stream_id).await?;

        metrics::record_viewer_session("leave");
        debug!(
            stream_id = %stream_id,
            session_id = %session_id,
            watch_duration_seconds = session.watch_duration_seconds.unwrap_or(0),
            "Viewer left"
        );
        Ok(session)
    }
}

/// Viewer-side aggregates derived from a stream's sessions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub total_unique_viewers: u64,
    /// Mean over closed sessions only
    pub average_watch_duration_seconds: i64,
    pub viewer_countries: BTreeMap<String, u64>,
    pub sessions_recorded: u64,
    pub total_rebuffer_events: i64,
    pub total_rebuffer_duration_ms: i64,
    pub peak_quality_distribution: BTreeMap<String, u64>,
}

impl SessionSummary {
    pub fn from_sessions(sessions: &[ViewerSession]) -> Self {
        let unique: HashSet<&str> = sessions.iter().map(|s| s.viewer_identity.as_str()).collect();

        let mut by_country: BTreeMap<String, HashSet<&str>> = BTreeMap::new();
        for session in sessions {
            if let Some(country) = &session.viewer_country {
                by_country
                    .entry(country.clone())
                    .or_default()
                    .insert(session.viewer_identity.as_str());
            }
        }

        let closed: Vec<i64> = sessions
            .iter()
            .filter_map(|s| s.watch_duration_seconds)
            .collect();
        let average_watch_duration_seconds = if closed.is_empty() {
            0
        } else {
            closed.iter().sum::<i64>() / closed.len() as i64
        };

        let mut peak_quality_distribution = BTreeMap::new();
        for layer in sessions.iter().filter_map(|s| s.peak_quality_layer) {
            *peak_quality_distribution
                .entry(layer.as_str().to_string())
                .or_insert(0) += 1;
        }

        Self {
            total_unique_viewers: unique.len() as u64,
            average_watch_duration_seconds,
            viewer_countries: by_country
                .into_iter()
                .map(|(country, viewers)| (country, viewers.len() as u64))
                .collect(),
            sessions_recorded: sessions.len() as u64,
            total_rebuffer_events: sessions.iter().map(|s| i64::from(s.rebuffer_events)).sum(),
            total_rebuffer_duration_ms: sessions.iter().map(|s| s.rebuffer_duration_ms).sum(),
            peak_quality_distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(identity: &str, country: Option<&str>, watched: Option<i64>) -> ViewerSession {
        let joined_at = Utc::now();
        ViewerSession {
            id: Uuid::new_v4(),
            stream_id: Uuid::nil(),
            viewer_id: None,
            viewer_identity: identity.to_string(),
            joined_at,
            left_at: watched.map(|secs| joined_at + Duration::seconds(secs)),
            watch_duration_seconds: watched,
            peak_quality_layer: Some(QualityLayer::High),
            rebuffer_events: 2,
            rebuffer_duration_ms: 150,
            viewer_ip: None,
            viewer_country: country.map(str::to_string),
            device_type: None,
        }
    }

    #[test]
    fn test_summary_counts_unique_viewers() {
        let sessions = vec![
            session("user:a", Some("US"), Some(60)),
            session("user:a", Some("US"), Some(120)),
            session("anon:1.2.3.4", Some("DE"), None),
        ];
        let summary = SessionSummary::from_sessions(&sessions);

        assert_eq!(summary.total_unique_viewers, 2);
        assert_eq!(summary.average_watch_duration_seconds, 90);
        assert_eq!(summary.viewer_countries.get("US"), Some(&1));
        assert_eq!(summary.viewer_countries.get("DE"), Some(&1));
        assert_eq!(summary.sessions_recorded, 3);
        assert_eq!(summary.total_rebuffer_events, 6);
        assert_eq!(summary.peak_quality_distribution.get("high"), Some(&3));
    }

    #[test]
    fn test_summary_without_closed_sessions() {
        let summary = SessionSummary::from_sessions(&[session("user:a", None, None)]);
        assert_eq!(summary.average_watch_duration_seconds, 0);
        assert!(summary.viewer_countries.is_empty());
    }
}
