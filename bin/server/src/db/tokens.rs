//! API token records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tmail_core::ApiTokenId;
use tmail_identity::{ApiToken, OwnedBy, StoreError, TokenSecret, TokenStore, User};

use super::users::UserRow;
use super::{PgStore, parse_id, store_error};

/// Row type for token queries. The secret column is never selected.
#[derive(FromRow)]
struct TokenRow {
    id: String,
    user_id: String,
    label: String,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    revoked: bool,
}

impl TokenRow {
    fn try_into_token(self) -> Result<ApiToken, StoreError> {
        Ok(ApiToken::with_all_fields(
            parse_id("api_tokens.id", &self.id)?,
            parse_id("api_tokens.user_id", &self.user_id)?,
            self.label,
            self.created_at,
            self.last_used_at,
            self.revoked,
        ))
    }
}

/// A token joined with its owner.
#[derive(FromRow)]
struct TokenOwnerRow {
    #[sqlx(flatten)]
    token: TokenRow,
    owner_external_id: String,
    owner_username: String,
    owner_avatar_url: String,
    owner_email: String,
    owner_created_at: DateTime<Utc>,
    owner_updated_at: DateTime<Utc>,
}

impl TokenOwnerRow {
    fn try_into_pair(self) -> Result<(ApiToken, User), StoreError> {
        let owner = UserRow {
            id: self.token.user_id.clone(),
            external_id: self.owner_external_id,
            username: self.owner_username,
            avatar_url: self.owner_avatar_url,
            email: self.owner_email,
            created_at: self.owner_created_at,
            updated_at: self.owner_updated_at,
        };
        Ok((self.token.try_into_token()?, owner.try_into_user()?))
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(
        &self,
        token: &ApiToken,
        secret: &TokenSecret,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO api_tokens (id, user_id, secret, label, created_at, last_used_at, revoked)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id().to_string())
        .bind(token.user_id().to_string())
        .bind(secret.as_str())
        .bind(token.label())
        .bind(token.created_at())
        .bind(token.last_used_at())
        .bind(token.is_revoked())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn find_token_by_secret(
        &self,
        secret: &str,
    ) -> Result<Option<(ApiToken, User)>, StoreError> {
        let row: Option<TokenOwnerRow> = sqlx::query_as(
            r#"
            SELECT t.id, t.user_id, t.label, t.created_at, t.last_used_at, t.revoked,
                   u.external_id AS owner_external_id,
                   u.username AS owner_username,
                   u.avatar_url AS owner_avatar_url,
                   u.email AS owner_email,
                   u.created_at AS owner_created_at,
                   u.updated_at AS owner_updated_at
            FROM api_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.secret = $1
            "#,
        )
        .bind(secret)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(TokenOwnerRow::try_into_pair).transpose()
    }

    async fn find_token(&self, id: ApiTokenId) -> Result<Option<ApiToken>, StoreError> {
        let row: Option<TokenRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, label, created_at, last_used_at, revoked
            FROM api_tokens
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(TokenRow::try_into_token).transpose()
    }

    async fn list_tokens(&self, owner: OwnedBy) -> Result<Vec<ApiToken>, StoreError> {
        let rows: Vec<TokenRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, label, created_at, last_used_at, revoked
            FROM api_tokens
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(TokenRow::try_into_token).collect()
    }

    async fn touch_token(
        &self,
        id: ApiTokenId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError> {
        // GREATEST skips NULL, so the first use simply stores `at`.
        let last_used: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            UPDATE api_tokens
            SET last_used_at = GREATEST(last_used_at, $2)
            WHERE id = $1
            RETURNING last_used_at
            "#,
        )
        .bind(id.to_string())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?
        .flatten();

        last_used.ok_or_else(|| StoreError::Unavailable {
            details: format!("token {id} vanished during touch"),
        })
    }

    async fn revoke_token(&self, id: ApiTokenId, owner: OwnedBy) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE api_tokens
            SET revoked = TRUE
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id.to_string())
        .bind(owner.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }
}
