//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] and [`fred`] errors. At the storage seam they are converted into
//! [`StoreError`] so services stay backend-agnostic.

use syndicate_core::StoreError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded into its domain type.
    #[error("cannot decode {entity}: {message}")]
    Decode {
        /// Kind of record.
        entity: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Shorthand for [`DbError::Decode`].
    pub fn decode(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            entity,
            message: message.into(),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Decode { entity, message } => Self::Corrupt { entity, message },
            DbError::Dragonfly(inner) => Self::Coordination(inner.to_string()),
            other => Self::Backend(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use syndicate_types::ErrorKind;

    use super::*;

    #[test]
    fn decode_errors_surface_as_corrupt_rows() {
        let store: StoreError = DbError::decode("business", "unknown status \"open\"").into();
        assert!(matches!(store, StoreError::Corrupt { entity: "business", .. }));
        assert_eq!(store.kind(), ErrorKind::Storage);
    }

    #[test]
    fn config_errors_are_backend_failures() {
        let store: StoreError = DbError::Config("bad url".to_owned()).into();
        assert!(matches!(store, StoreError::Backend(_)));
        assert!(store.to_string().contains("bad url"));
    }
}
