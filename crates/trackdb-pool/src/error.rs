//! Pool error types.

use thiserror::Error;

/// Errors that can occur while configuring the pool or opening and closing
/// its connections.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The physical connection could not be opened or set up.
    #[error("failed to open database connection '{name}': {source}")]
    Open {
        /// Generated name of the connection that failed to open.
        name: String,
        /// Error reported by the database client.
        #[source]
        source: rusqlite::Error,
    },

    /// The physical connection reported an error while closing.
    #[error("failed to close database connection '{name}': {source}")]
    Close {
        /// Name of the connection that failed to close.
        name: String,
        /// Error reported by the database client.
        #[source]
        source: rusqlite::Error,
    },

    /// The requested driver is not supported.
    #[error("unsupported database driver: {0}")]
    UnsupportedDriver(String),

    /// Invalid connection parameters or pool settings.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PoolError {
    /// Name of the connection involved, if the error concerns one.
    #[must_use]
    pub fn connection_name(&self) -> Option<&str> {
        match self {
            Self::Open { name, .. } | Self::Close { name, .. } => Some(name),
            Self::UnsupportedDriver(_) | Self::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_name() {
        let err = PoolError::Open {
            name: "library-3".to_string(),
            source: rusqlite::Error::InvalidQuery,
        };
        assert_eq!(err.connection_name(), Some("library-3"));
        assert!(err.to_string().contains("library-3"));

        let err = PoolError::UnsupportedDriver("QMYSQL".to_string());
        assert_eq!(err.connection_name(), None);
        assert_eq!(err.to_string(), "unsupported database driver: QMYSQL");
    }
}
