use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo;
use crate::auth::repo_types::{Role, User};
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated user attached to a request, password hash stripped.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// Auth guard. Resolves the bearer token (header or cookie) into a loaded
/// [`Principal`], rejecting revoked tokens and tokens issued before the
/// user's last password change.
pub struct CurrentUser(pub Principal);

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
}

/// Cookie fallback: `token=` or `accessToken=`.
pub(crate) fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').map(str::trim).find_map(|pair| {
        pair.strip_prefix("token=")
            .or_else(|| pair.strip_prefix("accessToken="))
    })
}

pub(crate) fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

/// True when the token predates the user's last password change. Such tokens
/// must stop validating so a stolen pre-rotation token is useless.
pub(crate) fn issued_before_password_change(
    iat: usize,
    password_changed_at: Option<OffsetDateTime>,
) -> bool {
    match password_changed_at {
        Some(changed) => (iat as i64) < changed.unix_timestamp(),
        None => false,
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or_else(|| {
            ApiError::Unauthenticated("not authorized to access this route".into())
        })?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            ApiError::Unauthenticated(e.to_string())
        })?;

        if state.config.jwt.blacklist_enabled
            && repo::is_token_blacklisted(&state.db, token).await?
        {
            return Err(ApiError::Unauthenticated("token has been revoked".into()));
        }

        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthenticated("user no longer exists".into()))?;

        if !user.is_active {
            return Err(ApiError::Unauthenticated("account is deactivated".into()));
        }

        if issued_before_password_change(claims.iat, user.password_changed_at) {
            return Err(ApiError::Unauthenticated(
                "password was changed after this token was issued, please log in again".into(),
            ));
        }

        Ok(CurrentUser(user.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use time::Duration;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_extracted_from_authorization_header() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer abc.def.ghi");
        assert_eq!(token_from_headers(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn cookie_fallback_reads_token_and_access_token() {
        let headers = headers_with(header::COOKIE, "theme=dark; token=abc.def");
        assert_eq!(token_from_headers(&headers), Some("abc.def"));

        let headers = headers_with(header::COOKIE, "accessToken=zzz.yyy");
        assert_eq!(token_from_headers(&headers), Some("zzz.yyy"));
    }

    #[test]
    fn header_token_wins_over_cookie() {
        let mut headers = headers_with(header::AUTHORIZATION, "Bearer from-header");
        headers.insert(header::COOKIE, HeaderValue::from_static("token=from-cookie"));
        assert_eq!(token_from_headers(&headers), Some("from-header"));
    }

    #[test]
    fn missing_token_yields_none() {
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
        let headers = headers_with(header::AUTHORIZATION, "Basic dXNlcjpwYXNz");
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn tokens_issued_before_password_change_are_stale() {
        let changed = OffsetDateTime::now_utc();
        let before = (changed - Duration::minutes(5)).unix_timestamp() as usize;
        let after = (changed + Duration::minutes(5)).unix_timestamp() as usize;

        assert!(issued_before_password_change(before, Some(changed)));
        assert!(!issued_before_password_change(after, Some(changed)));
        assert!(!issued_before_password_change(before, None));
    }

    #[test]
    fn token_issued_at_change_instant_stays_valid() {
        let changed = OffsetDateTime::now_utc();
        let iat = changed.unix_timestamp() as usize;
        assert!(!issued_before_password_change(iat, Some(changed)));
    }
}
