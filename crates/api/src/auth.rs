//! Bearer token extraction.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domain::Requester;
use store::Store;

use crate::AppState;
use crate::error::ApiError;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
///
/// Handlers that take this extractor reject anonymous requests with 401.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Requester);

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let requester = state.services.users.authenticate(token).await?;
        Ok(AuthUser(requester))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".to_string()))?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(&headers("bearer  abc ")).unwrap(), "abc");
        assert!(bearer_token(&headers("Basic dXNlcg==")).is_err());
        assert!(bearer_token(&headers("Bearer ")).is_err());
        assert!(bearer_token(&HeaderMap::new()).is_err());
    }
}
