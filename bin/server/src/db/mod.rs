//! Postgres-backed record store.
//!
//! [`PgStore`] implements every record-store trait the identity layer
//! needs:
//! - users and API tokens
//! - mailboxes, envelopes and attachments (read through their owner)
//! - pending OAuth login states

mod login_states;
mod mailboxes;
mod tokens;
mod users;

use sqlx::PgPool;
use std::fmt::Display;
use std::str::FromStr;
use tmail_identity::StoreError;

/// Record store on a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new store on `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a database failure, singling out unique violations.
fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict {
                constraint: db.constraint().unwrap_or("unique").to_string(),
            };
        }
    }
    StoreError::Unavailable {
        details: err.to_string(),
    }
}

/// Parses a stored identifier column.
fn parse_id<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: Display,
{
    T::from_str(value).map_err(|e| StoreError::Corrupt {
        details: format!("invalid {column} '{value}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmail_core::UserId;

    #[test]
    fn non_database_errors_are_unavailable() {
        let err = store_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert!(!err.is_conflict());
    }

    #[test]
    fn stored_ids_parse_or_report_corruption() {
        let id = UserId::new();
        let parsed: UserId = parse_id("users.id", &id.to_string()).expect("round trip");
        assert_eq!(parsed, id);

        let err = parse_id::<UserId>("users.id", "not-an-id").expect_err("garbage");
        assert!(matches!(err, StoreError::Corrupt { details } if details.contains("users.id")));
    }
}
