use std::net::SocketAddr;

use thiserror::Error;

/// Failures while bringing the server or a CLI command up.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database url is not configured (set database.url or YATUBE__DATABASE__URL)")]
    MissingDatabaseUrl,
    #[error("database {action} failed: {source}")]
    Database {
        action: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn database(action: &'static str, source: sqlx::Error) -> Self {
        Self::Database { action, source }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failed_step() {
        let err = InfraError::database("migration", sqlx::Error::PoolTimedOut);
        assert!(err.to_string().starts_with("database migration failed: "));

        let bind = InfraError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.to_string().starts_with("failed to bind 127.0.0.1:3000: "));
    }
}
