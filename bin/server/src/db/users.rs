//! User records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tmail_identity::{StoreError, User, UserStore};

use super::{PgStore, parse_id, store_error};

/// Row type for user queries.
#[derive(FromRow)]
pub(super) struct UserRow {
    pub(super) id: String,
    pub(super) external_id: String,
    pub(super) username: String,
    pub(super) avatar_url: String,
    pub(super) email: String,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

impl UserRow {
    pub(super) fn try_into_user(self) -> Result<User, StoreError> {
        Ok(User::with_all_fields(
            parse_id("users.id", &self.id)?,
            self.external_id,
            self.username,
            self.avatar_url,
            self.email,
            self.created_at,
            self.updated_at,
        ))
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, external_id, username, avatar_url, email, created_at, updated_at
            FROM users
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(UserRow::try_into_user).transpose()
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, external_id, username, avatar_url, email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.external_id())
        .bind(user.username())
        .bind(user.avatar_url())
        .bind(user.email())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, avatar_url = $3, email = $4, updated_at = GREATEST(updated_at, $5)
            WHERE id = $1
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.username())
        .bind(user.avatar_url())
        .bind(user.email())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Unavailable {
                details: format!("user {} vanished during update", user.id()),
            });
        }
        Ok(())
    }
}
