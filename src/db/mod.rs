//! MySQL-backed user store
//!
//! A small CRUD surface over one `users` table. Passwords arrive already
//! hashed by the client; the stored value is an opaque credential compared
//! byte-for-byte at login.

use crate::errors::{AppError, Result};
use crate::types::UserProfile;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{FromRow, MySqlPool};
use uuid::Uuid;

/// Pool sizing mirrors the original deployment (5 + overflow)
const MAX_CONNECTIONS: u32 = 15;

/// One registered user row
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// Connect to MySQL and make sure the schema exists
pub async fn connect(database_url: &str) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .test_before_acquire(true)
        .connect(database_url)
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

async fn init_schema(pool: &MySqlPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id CHAR(36) PRIMARY KEY,
            username VARCHAR(64) NOT NULL UNIQUE,
            email VARCHAR(255) NOT NULL UNIQUE,
            hashed_password VARCHAR(255) NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a new user; a taken username or email is `DuplicateUser`
pub async fn insert_user(
    pool: &MySqlPool,
    username: &str,
    email: &str,
    hashed_password: &str,
) -> Result<User> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO users (id, username, email, hashed_password) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(username)
    .bind(email)
    .bind(hashed_password)
    .execute(pool)
    .await
    .map_err(|err| match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::DuplicateUser,
        _ => AppError::Database(err),
    })?;

    find_by_id(pool, &id)
        .await?
        .ok_or_else(|| AppError::Database(sqlx::Error::RowNotFound))
}

pub async fn find_by_email(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, hashed_password, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &MySqlPool, id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, hashed_password, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Cheap connectivity probe used by diagnostics
pub async fn ping(pool: &MySqlPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "3f2d1e0a-0000-0000-0000-000000000001".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            hashed_password: "a9f0e61a137d86aa".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_profile_omits_credential() {
        let user = sample_user();
        let profile = user.profile();
        assert_eq!(profile.username, "ada");
        assert_eq!(profile.email, "ada@example.com");
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("hashed_password"));
    }

    #[tokio::test]
    #[ignore] // Requires MySQL (set DATABASE_URL)
    async fn test_insert_and_duplicate_integration() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = connect(&url).await.unwrap();

        let email = format!("{}@example.com", Uuid::new_v4());
        let user = insert_user(&pool, &email, &email, "hash").await.unwrap();
        assert_eq!(user.email, email);

        let err = insert_user(&pool, &email, &email, "hash").await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateUser));
    }
}
