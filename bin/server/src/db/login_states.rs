//! Pending OAuth login states.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tmail_identity::{LoginStateStore, StoreError};

use super::{PgStore, store_error};

#[async_trait]
impl LoginStateStore for PgStore {
    async fn put_login_state(
        &self,
        state: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO login_states (state, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (state) DO NOTHING
            "#,
        )
        .bind(state)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn take_login_state(&self, state: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        sqlx::query_scalar(
            r#"
            DELETE FROM login_states
            WHERE state = $1
            RETURNING expires_at
            "#,
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)
    }

    async fn purge_login_states(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM login_states
            WHERE expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected())
    }
}
