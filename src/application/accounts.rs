//! Authentication boundary: user accounts and the opaque session tokens that
//! identify them.
//!
//! Tokens look like `yt_<prefix>_<secret>`. Only a SHA-256 digest of the
//! secret is stored; the prefix is the lookup key.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::repos::{
    CreateSessionTokenParams, RepoError, SessionTokensRepo, UsersRepo, UsersWriteRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::usernames::validate_username;

const TOKEN_PREFIX: &str = "yt";
const MIN_SECRET_LEN: usize = 32;

/// The authenticated requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
}

impl From<&UserRecord> for Identity {
    fn from(user: &UserRecord) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("user `{0}` already exists")]
    UsernameTaken(String),
    #[error("unknown user `{0}`")]
    UnknownUser(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed session token")]
    Malformed,
    #[error("invalid session token")]
    Invalid,
    #[error("revoked session token")]
    Revoked,
    /// The token could not be checked at all.
    #[error("session lookup failed")]
    Unavailable(#[source] RepoError),
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    users_write: Arc<dyn UsersWriteRepo>,
    tokens: Arc<dyn SessionTokensRepo>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        users_write: Arc<dyn UsersWriteRepo>,
        tokens: Arc<dyn SessionTokensRepo>,
    ) -> Self {
        Self {
            users,
            users_write,
            tokens,
        }
    }

    /// Create a user and hand back their first session token.
    pub async fn register(&self, username: &str) -> Result<IssuedToken, AccountError> {
        validate_username(username)?;

        if self.users.find_by_username(username).await?.is_some() {
            return Err(AccountError::UsernameTaken(username.to_string()));
        }

        let user = match self.users_write.create_user(username).await {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => {
                return Err(AccountError::UsernameTaken(username.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        info!(target = "yatube::accounts", username = %user.username, "user registered");
        self.issue_for(user).await
    }

    pub async fn issue_token(&self, username: &str) -> Result<IssuedToken, AccountError> {
        let user = self.require_user(username).await?;
        self.issue_for(user).await
    }

    pub async fn revoke_tokens(&self, username: &str) -> Result<u64, AccountError> {
        let user = self.require_user(username).await?;
        let revoked = self
            .tokens
            .revoke_for_user(user.id, OffsetDateTime::now_utc())
            .await?;
        info!(
            target = "yatube::accounts",
            username = %user.username,
            revoked,
            "session tokens revoked"
        );
        Ok(revoked)
    }

    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let parsed = parse_token(token).ok_or(AuthError::Malformed)?;
        let record = self
            .tokens
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(AuthError::Unavailable)?
            .ok_or(AuthError::Invalid)?;

        let now = OffsetDateTime::now_utc();
        if record
            .revoked_at
            .is_some_and(|revoked_at| revoked_at <= now)
        {
            return Err(AuthError::Revoked);
        }

        let hashed_input = hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AuthError::Invalid);
        }

        let user = self
            .users
            .find_user(record.user_id)
            .await
            .map_err(AuthError::Unavailable)?
            .ok_or(AuthError::Invalid)?;

        if let Err(err) = self.tokens.update_last_used(record.id, now).await {
            debug!(
                target = "yatube::accounts",
                error = %err,
                "failed to record token use"
            );
        }

        Ok(Identity::from(&user))
    }

    async fn require_user(&self, username: &str) -> Result<UserRecord, AccountError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AccountError::UnknownUser(username.to_string()))
    }

    async fn issue_for(&self, user: UserRecord) -> Result<IssuedToken, AccountError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");

        self.tokens
            .create_token(CreateSessionTokenParams {
                user_id: user.id,
                prefix,
                hashed_secret: hash_secret(&secret),
            })
            .await?;

        Ok(IssuedToken { user, token })
    }
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.trim().splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_token_splits_prefix_and_secret() {
        let secret = "a".repeat(40);
        let parsed = parse_token(&format!("yt_abc123_{secret}")).expect("parsed");
        assert_eq!(parsed.prefix, "abc123");
        assert_eq!(parsed.secret, secret);
    }

    #[test]
    fn parse_token_rejects_foreign_or_short_tokens() {
        assert!(parse_token("sk_abc_secret").is_none());
        assert!(parse_token(&format!("xx_abc_{}", "a".repeat(40))).is_none());
        assert!(parse_token("yt_abc_short").is_none());
        assert!(parse_token(&format!("yt__{}", "a".repeat(40))).is_none());
    }

    #[test]
    fn generated_tokens_parse_back() {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let parsed = parse_token(&format!("{TOKEN_PREFIX}_{prefix}_{secret}")).expect("parsed");
        assert_eq!(parsed.prefix, prefix);
        assert_eq!(hash_secret(&parsed.secret), hash_secret(&secret));
    }
}
