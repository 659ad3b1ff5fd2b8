use axum::{
    extract::{FromRef, Path, State},
    http::{header, HeaderMap},
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, PublicUser,
            RegisterRequest, ResetPasswordRequest, UpdatePasswordRequest,
        },
        extractors::{token_from_headers, CurrentUser},
        jwt::JwtKeys,
        password::{
            generate_reset_token, hash_password_blocking, hash_reset_token,
            verify_password_blocking,
        },
        repo,
        repo_types::{Role, User},
    },
    error::{conflict_on_unique, ApiError},
    response::{ApiResponse, ApiResult},
    state::AppState,
};

const RESET_TOKEN_TTL_MINUTES: i64 = 10;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/password", put(update_password))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:token", put(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::Validation("please provide your name".into()));
    }
    if name.len() > 50 {
        return Err(ApiError::Validation(
            "name cannot be more than 50 characters".into(),
        ));
    }
    Ok(())
}

fn auth_cookie(token: &str, max_age_secs: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let cookie = format!(
        "token={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, max_age_secs
    );
    if let Ok(value) = cookie.parse() {
        headers.insert(header::SET_COOKIE, value);
    }
    headers
}

fn clear_auth_cookie() -> HeaderMap {
    auth_cookie("", 0)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(HeaderMap, ApiResponse<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.name = payload.name.trim().to_string();

    validate_name(&payload.name)?;
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation(
            "please provide a valid email address".into(),
        ));
    }
    validate_password(&payload.password)?;

    let role = match payload.role.unwrap_or(Role::User) {
        role @ (Role::User | Role::RestaurantOwner) => role,
        other => {
            warn!(role = %other, "self-registration with privileged role");
            return Err(ApiError::Validation(format!(
                "role {other} cannot be self-assigned"
            )));
        }
    };

    let hash = hash_password_blocking(payload.password).await?;

    // uniqueness is enforced by the store; a losing concurrent create gets 409
    let user = User::create(&state.db, &payload.name, &payload.email, &hash, role)
        .await
        .map_err(|e| conflict_on_unique(e, "email already registered"))?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        auth_cookie(&token, keys.ttl.as_secs()),
        ApiResponse::created(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<(HeaderMap, ApiResponse<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "please provide email and password".into(),
        ));
    }

    // unknown email and wrong password are indistinguishable to the caller
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::Unauthenticated("invalid credentials".into())
        })?;

    let ok = verify_password_blocking(payload.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthenticated("invalid credentials".into()));
    }

    if !user.is_active {
        return Err(ApiError::Unauthenticated("account is deactivated".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, "user logged in");
    Ok((
        auth_cookie(&token, keys.ttl.as_secs()),
        ApiResponse::success(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
) -> Result<(HeaderMap, ApiResponse<()>), ApiError> {
    if state.config.jwt.blacklist_enabled {
        // the guard already validated this token, so it is present and sound
        if let Some(token) = token_from_headers(&headers) {
            let keys = JwtKeys::from_ref(&state);
            if let Ok(claims) = keys.verify(token) {
                let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
                    .map_err(anyhow::Error::from)?;
                repo::blacklist_token(&state.db, token, expires_at).await?;
            }
        }
        let purged = repo::purge_expired_tokens(&state.db).await?;
        if purged > 0 {
            info!(purged, "expired blacklist entries removed");
        }
    }

    info!(user_id = %principal.id, "user logged out");
    Ok((
        clear_auth_cookie(),
        ApiResponse::success(()).with_message("logged out successfully"),
    ))
}

#[instrument(skip(_state))]
pub async fn get_me(
    State(_state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> ApiResult<PublicUser> {
    Ok(ApiResponse::success(principal.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> ApiResult<()> {
    validate_password(&payload.new_password)?;

    let user = User::find_by_id(&state.db, principal.id)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("user no longer exists".into()))?;

    let ok = verify_password_blocking(payload.current_password, user.password_hash).await?;
    if !ok {
        return Err(ApiError::Unauthenticated(
            "current password is incorrect".into(),
        ));
    }

    let hash = hash_password_blocking(payload.new_password).await?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password updated");
    Ok(ApiResponse::success(()).with_message("password updated successfully"))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> ApiResult<ForgotPasswordResponse> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("no user found with that email".into()))?;

    let (token, token_hash) = generate_reset_token();
    let expires_at = OffsetDateTime::now_utc() + TimeDuration::minutes(RESET_TOKEN_TTL_MINUTES);
    User::set_reset_token(&state.db, user.id, &token_hash, expires_at).await?;

    info!(user_id = %user.id, "reset token issued");
    Ok(ApiResponse::success(ForgotPasswordResponse { reset_token: token }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<()> {
    validate_password(&payload.password)?;

    let token_hash = hash_reset_token(&token);
    let user = User::find_by_reset_token(&state.db, &token_hash)
        .await?
        .ok_or_else(|| ApiError::Validation("invalid or expired reset token".into()))?;

    let hash = hash_password_blocking(payload.password).await?;
    // clears the reset fields and stamps password_changed_at
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(ApiResponse::success(()).with_message("password reset successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_accepts_plausible_addresses() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b-c@sub.domain.io"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("two@@example.com"));
    }

    #[test]
    fn password_validation_requires_eight_characters() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn name_validation_bounds() {
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(51)).is_err());
        assert!(validate_name("Ada Lovelace").is_ok());
    }

    #[test]
    fn auth_cookie_is_http_only() {
        let headers = auth_cookie("abc.def", 3600);
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("token=abc.def"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let headers = clear_auth_cookie();
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
