//! Request actor
//!
//! Every engine operation is performed on behalf of an [`Actor`]. Anonymous
//! viewers are a first-class variant instead of a missing user id, so display
//! name fallback and authorization checks are exhaustive matches.

use crate::error::{AppError, Result};
use uuid::Uuid;

pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous";

/// Authenticated user as asserted by the identity service token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub display_name: String,
    pub kyc_tier: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Authenticated(AuthenticatedUser),
    /// `connection_id` is the client address as seen by the server
    Anonymous { connection_id: String },
}

impl Actor {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Actor::Authenticated(user) => Some(user.id),
            Actor::Anonymous { .. } => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Actor::Authenticated(user) => &user.display_name,
            Actor::Anonymous { .. } => ANONYMOUS_DISPLAY_NAME,
        }
    }

    /// Identity used for rate limiting and unique-viewer counting
    pub fn identity(&self) -> String {
        match self {
            Actor::Authenticated(user) => format!("user:{}", user.id),
            Actor::Anonymous { connection_id } => format!("anon:{}", connection_id),
        }
    }

    pub fn authenticated(&self) -> Result<&AuthenticatedUser> {
        match self {
            Actor::Authenticated(user) => Ok(user),
            Actor::Anonymous { .. } => Err(AppError::Unauthenticated),
        }
    }

    pub fn is_user(&self, user_id: Uuid) -> bool {
        self.user_id() == Some(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_actor_fallbacks() {
        let actor = Actor::Anonymous {
            connection_id: "10.0.0.1".into(),
        };
        assert_eq!(actor.user_id(), None);
        assert_eq!(actor.display_name(), "Anonymous");
        assert_eq!(actor.identity(), "anon:10.0.0.1");
        assert!(matches!(actor.authenticated(), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_authenticated_actor_identity() {
        let id = Uuid::new_v4();
        let actor = Actor::Authenticated(AuthenticatedUser {
            id,
            display_name: "alice".into(),
            kyc_tier: 1,
        });
        assert!(actor.is_user(id));
        assert_eq!(actor.display_name(), "alice");
        assert_eq!(actor.identity(), format!("user:{}", id));
    }
}
