//! Data Access Layer
//!
//! Postgres-backed user records for phone registration. Queries are checked
//! at runtime so the crate builds without a live database.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use vaani_core::registration::{PendingUser, UserStore};

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for Db {
    async fn upsert_pending(&self, user: &PendingUser) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (name, phone, gender, otp, verified, role)
            VALUES ($1, $2, $3, $4, FALSE, 'user')
            ON CONFLICT (phone) DO UPDATE
            SET name = EXCLUDED.name,
                gender = EXCLUDED.gender,
                otp = EXCLUDED.otp,
                verified = FALSE,
                updated_at = NOW()
            "#,
        )
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.gender.to_string())
        .bind(user.otp as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_otp(&self, phone: &str) -> Result<Option<u32>> {
        let otp: Option<i32> = sqlx::query_scalar("SELECT otp FROM users WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(otp.and_then(|otp| u32::try_from(otp).ok()))
    }

    async fn mark_verified(&self, phone: &str) -> Result<()> {
        sqlx::query("UPDATE users SET verified = TRUE, updated_at = NOW() WHERE phone = $1")
            .bind(phone)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
