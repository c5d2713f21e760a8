use crate::errors::ApiError;
use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use chrono::{Duration, Utc};
use futures_util::future::{Ready, ready};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: usize,
}

/// Turns a bearer credential into a stable user id.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Result<String, ApiError>;
}

/// HS256 tokens whose `sub` claim is the user id.
pub struct JwtIdentity {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentity {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self { key: DecodingKey::from_secret(secret), validation }
    }
}

impl IdentityResolver for JwtIdentity {
    fn resolve(&self, credential: &str) -> Result<String, ApiError> {
        let claims = jsonwebtoken::decode::<Claims>(credential, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("token rejected: {e}");
                ApiError::Unauthenticated
            })?;
        if claims.sub.is_empty() {
            return Err(ApiError::Unauthenticated);
        }
        Ok(claims.sub)
    }
}

pub fn create_access_token(
    user_id: &str,
    secret: &[u8],
    ttl: Duration,
) -> Result<String, ApiError> {
    let exp = (Utc::now() + ttl).timestamp().max(0) as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|_| ApiError::Internal)
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: &str) -> Result<&str, ApiError> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(ApiError::Unauthenticated),
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let resolver = req
        .app_data::<web::Data<dyn IdentityResolver>>()
        .ok_or_else(|| {
            log::error!("no identity resolver registered");
            ApiError::Internal
        })?;
    let header = req
        .headers()
        .get("Authorization")
        .ok_or(ApiError::Unauthenticated)?
        .to_str()
        .map_err(|_| ApiError::Unauthenticated)?;
    let token = extract_bearer(header)?;
    let user_id = resolver.resolve(token)?;
    Ok(AuthUser { user_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn token_round_trips_to_user_id() {
        let token = create_access_token("user_abc", SECRET, Duration::minutes(5)).unwrap();
        let id = JwtIdentity::new(SECRET).resolve(&token).unwrap();
        assert_eq!(id, "user_abc");
    }

    #[test]
    fn wrong_secret_and_expired_tokens_fail() {
        let token = create_access_token("u", SECRET, Duration::minutes(5)).unwrap();
        assert!(matches!(
            JwtIdentity::new(b"other").resolve(&token),
            Err(ApiError::Unauthenticated)
        ));

        let expired = create_access_token("u", SECRET, Duration::hours(-1)).unwrap();
        assert!(matches!(
            JwtIdentity::new(SECRET).resolve(&expired),
            Err(ApiError::Unauthenticated)
        ));
    }

    #[test]
    fn bearer_header_format() {
        assert_eq!(extract_bearer("Bearer abc").unwrap(), "abc");
        for bad in [
            "",
            "Bearer",
            "Bearer ",
            "bearer abc",
            "Basic abc",
            "Bearer a b",
            "Bearer  abc",
        ] {
            assert!(extract_bearer(bad).is_err(), "{bad:?}");
        }
    }
}
