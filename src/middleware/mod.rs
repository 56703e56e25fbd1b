use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// HS256 by default. `exp` is checked only when the token carries one.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, EngineError> {
    let mut validation = Validation::default();
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            EngineError::Unauthenticated
        })
}

// Bearer JWT extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = EngineError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(EngineError::Unauthenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(EngineError::Unauthenticated)?;

        let claims = verify_token(token.trim(), &state.config.jwt.secret)?;
        Ok(AuthUser {
            user_id: claims.user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_user_id() {
        let user_id = Uuid::new_v4();
        let jwt = token(&Claims { user_id, exp: None }, "secret");
        assert_eq!(verify_token(&jwt, "secret").unwrap().user_id, user_id);
    }

    #[test]
    fn wrong_secret_is_unauthenticated() {
        let jwt = token(&Claims { user_id: Uuid::new_v4(), exp: None }, "secret");
        assert!(matches!(verify_token(&jwt, "other"), Err(EngineError::Unauthenticated)));
    }

    #[test]
    fn expired_token_is_unauthenticated() {
        let jwt = token(&Claims { user_id: Uuid::new_v4(), exp: Some(1) }, "secret");
        assert!(matches!(verify_token(&jwt, "secret"), Err(EngineError::Unauthenticated)));
    }

    #[test]
    fn garbage_is_unauthenticated() {
        assert!(matches!(verify_token("not-a-jwt", "secret"), Err(EngineError::Unauthenticated)));
    }
}
