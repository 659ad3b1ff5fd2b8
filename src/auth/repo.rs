use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{Role, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, \
     password_changed_at, reset_token_hash, reset_token_expires_at, created_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Insert a new user with an already-hashed password. A duplicate email
    /// surfaces as a unique violation from the store.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(db)
        .await
    }

    /// Store a new password hash. Stamps `password_changed_at` so tokens
    /// issued earlier stop validating, and clears any pending reset token.
    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users
             SET password_hash = $2,
                 password_changed_at = now(),
                 reset_token_hash = NULL,
                 reset_token_expires_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Look up the user holding an unexpired reset token hash.
    pub async fn find_by_reset_token(db: &PgPool, token_hash: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE reset_token_hash = $1 AND reset_token_expires_at > now()"
        ))
        .bind(token_hash)
        .fetch_optional(db)
        .await
    }
}

// ---- token blacklist (optional capability) ----

pub async fn blacklist_token(
    db: &PgPool,
    token: &str,
    expires_at: OffsetDateTime,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO blacklisted_tokens (token, expires_at)
         VALUES ($1, $2)
         ON CONFLICT (token) DO NOTHING",
    )
    .bind(token)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn is_token_blacklisted(db: &PgPool, token: &str) -> sqlx::Result<bool> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT 1 FROM blacklisted_tokens WHERE token = $1 AND expires_at > now()")
            .bind(token)
            .fetch_optional(db)
            .await?;
    Ok(row.is_some())
}

/// Drop rows whose natural token expiry has passed.
pub async fn purge_expired_tokens(db: &PgPool) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM blacklisted_tokens WHERE expires_at <= now()")
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
