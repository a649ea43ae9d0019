use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateSessionTokenParams, RepoError, SessionTokensRepo};
use crate::domain::entities::SessionTokenRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SessionTokenRow {
    id: Uuid,
    user_id: Uuid,
    prefix: String,
    hashed_secret: Vec<u8>,
    created_at: OffsetDateTime,
    last_used_at: Option<OffsetDateTime>,
    revoked_at: Option<OffsetDateTime>,
}

impl From<SessionTokenRow> for SessionTokenRecord {
    fn from(row: SessionTokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            revoked_at: row.revoked_at,
        }
    }
}

#[async_trait]
impl SessionTokensRepo for PostgresRepositories {
    async fn create_token(
        &self,
        params: CreateSessionTokenParams,
    ) -> Result<SessionTokenRecord, RepoError> {
        let row = sqlx::query_as::<_, SessionTokenRow>(
            r#"
            INSERT INTO session_tokens (id, user_id, prefix, hashed_secret, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, prefix, hashed_secret, created_at, last_used_at, revoked_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.prefix)
        .bind(params.hashed_secret)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SessionTokenRecord::from(row))
    }

    async fn find_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionTokenRecord>, RepoError> {
        let row = sqlx::query_as::<_, SessionTokenRow>(
            r#"
            SELECT id, user_id, prefix, hashed_secret, created_at, last_used_at, revoked_at
            FROM session_tokens
            WHERE prefix = $1
            "#,
        )
        .bind(prefix)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SessionTokenRecord::from))
    }

    async fn update_last_used(&self, id: Uuid, when: OffsetDateTime) -> Result<(), RepoError> {
        sqlx::query("UPDATE session_tokens SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(when)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn revoke_for_user(
        &self,
        user_id: Uuid,
        when: OffsetDateTime,
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE session_tokens SET revoked_at = $2 WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(when)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
