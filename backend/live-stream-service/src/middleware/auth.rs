//! Bearer-token authentication
//!
//! Tokens are optional: no `Authorization` header yields an anonymous actor
//! keyed by the peer IP, while a header that does not carry a valid HS256
//! token is rejected with 401.

use crate::error::AppError;
use crate::models::{Actor, AuthenticatedUser};
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub kyc_tier: i16,
    pub exp: usize,
}

pub struct JwtValidator {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn validate(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::warn!("JWT validation failed: {}", e);
            AppError::Unauthenticated
        })?;

        let id = Uuid::parse_str(&data.claims.sub).map_err(|e| {
            tracing::warn!("Invalid user_id UUID in token: {}", e);
            AppError::Unauthenticated
        })?;

        let display_name = data
            .claims
            .username
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("user-{}", &id.simple().to_string()[..8]));

        Ok(AuthenticatedUser {
            id,
            display_name,
            kyc_tier: data.claims.kyc_tier,
        })
    }

    /// Sign claims with the shared secret (local tooling and tests)
    pub fn issue(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {}", e)))
    }

    /// Resolve the actor for a request
    pub fn actor_for(&self, req: &HttpRequest) -> Result<Actor, AppError> {
        let Some(value) = req.headers().get(header::AUTHORIZATION) else {
            return Ok(Actor::Anonymous {
                connection_id: client_address(req),
            });
        };

        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthenticated)?;

        self.validate(token).map(Actor::Authenticated)
    }
}

/// IP of the socket peer
///
/// Forwarding headers are client-controlled and never consulted. The port is
/// dropped so one host keeps a single identity across connections.
pub fn client_address(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl FromRequest for Actor {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<JwtValidator>>() {
            Some(validator) => validator.actor_for(req),
            None => Err(AppError::Internal("JWT validator not configured".to_string())),
        };
        ready(result.map_err(actix_web::Error::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn claims(sub: String, exp_offset: i64) -> Claims {
        Claims {
            sub,
            username: Some("alice".into()),
            kyc_tier: 1,
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        }
    }

    #[test]
    fn test_round_trip_claims() {
        let validator = JwtValidator::new("secret");
        let id = Uuid::new_v4();
        let token = validator.issue(&claims(id.to_string(), 3600)).unwrap();

        let user = validator.validate(&token).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.display_name, "alice");
        assert_eq!(user.kyc_tier, 1);
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired() {
        let issuer = JwtValidator::new("secret");
        let other = JwtValidator::new("other");
        let token = issuer.issue(&claims(Uuid::new_v4().to_string(), 3600)).unwrap();
        assert!(matches!(other.validate(&token), Err(AppError::Unauthenticated)));

        let expired = issuer.issue(&claims(Uuid::new_v4().to_string(), -3600)).unwrap();
        assert!(matches!(issuer.validate(&expired), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        let validator = JwtValidator::new("secret");
        let req = TestRequest::default()
            .peer_addr("10.0.0.7:5000".parse().unwrap())
            .to_http_request();
        match validator.actor_for(&req).unwrap() {
            Actor::Anonymous { connection_id } => assert_eq!(connection_id, "10.0.0.7"),
            other => panic!("expected anonymous actor, got {other:?}"),
        }
    }

    #[test]
    fn test_forwarded_headers_do_not_change_identity() {
        let validator = JwtValidator::new("secret");
        let identities: Vec<String> = ["198.51.100.1", "203.0.113.9, 10.0.0.1"]
            .into_iter()
            .enumerate()
            .map(|(i, forwarded)| {
                let req = TestRequest::default()
                    .peer_addr(format!("10.0.0.7:{}", 5000 + i).parse().unwrap())
                    .insert_header(("x-forwarded-for", forwarded))
                    .insert_header((header::FORWARDED, format!("for={}", forwarded)))
                    .to_http_request();
                validator.actor_for(&req).unwrap().identity()
            })
            .collect();
        assert_eq!(identities, vec!["anon:10.0.0.7", "anon:10.0.0.7"]);
    }

    #[test]
    fn test_malformed_header_is_rejected() {
        let validator = JwtValidator::new("secret");
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Token abc"))
            .to_http_request();
        assert!(matches!(
            validator.actor_for(&req),
            Err(AppError::Unauthenticated)
        ));
    }
}
