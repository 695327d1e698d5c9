use axum::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use std::convert::Infallible;

#[derive(Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Resolved caller identity. Token verification is best-effort: a missing,
/// malformed, or expired token degrades to `Anonymous` rather than failing
/// the request, so the rewrite path never hard-401s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    User(String),
    Anonymous,
}

impl CallerIdentity {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            CallerIdentity::User(id) => Some(id),
            CallerIdentity::Anonymous => None,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token_opt = if let Some(authz) = parts.headers.get(axum::http::header::AUTHORIZATION) {
            authz
                .to_str()
                .ok()
                .and_then(|s| s.strip_prefix("Bearer ").map(|s| s.to_string()))
        } else if let Some(cookie_header) = parts.headers.get(axum::http::header::COOKIE) {
            let cookies = cookie_header.to_str().unwrap_or("");
            cookies.split(';').find_map(|c| {
                let c = c.trim();
                c.strip_prefix("auth_token=").map(|s| s.to_string())
            })
        } else {
            None
        };

        let Some(token) = token_opt else {
            return Ok(CallerIdentity::Anonymous);
        };
        let Some(secret) = crate::config::JWT_SECRET.as_deref() else {
            tracing::debug!("JWT_SECRET unset; treating caller as anonymous");
            return Ok(CallerIdentity::Anonymous);
        };

        match decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(decoded) => Ok(CallerIdentity::User(decoded.claims.sub)),
            Err(error) => {
                tracing::debug!(%error, "token verification failed; degrading to anonymous");
                Ok(CallerIdentity::Anonymous)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[tokio::test]
    async fn token_parsed_from_header() {
        std::env::set_var("JWT_SECRET", "secret");
        let claims = serde_json::json!({"sub": "user-7", "exp": 9999999999u64});
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let request = Request::builder()
            .header("Authorization", format!("Bearer {}", token))
            .body(axum::body::Body::empty())
            .unwrap();
        let mut parts = request.into_parts().0;
        let identity = CallerIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(identity, CallerIdentity::User("user-7".into()));
    }

    #[tokio::test]
    async fn invalid_token_degrades_to_anonymous() {
        std::env::set_var("JWT_SECRET", "secret");
        let request = Request::builder()
            .header("Authorization", "Bearer invalid")
            .body(axum::body::Body::empty())
            .unwrap();
        let mut parts = request.into_parts().0;
        let identity = CallerIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(identity, CallerIdentity::Anonymous);
    }

    #[tokio::test]
    async fn missing_token_is_anonymous() {
        let request = Request::builder()
            .body(axum::body::Body::empty())
            .unwrap();
        let mut parts = request.into_parts().0;
        let identity = CallerIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(identity, CallerIdentity::Anonymous);
    }
}
