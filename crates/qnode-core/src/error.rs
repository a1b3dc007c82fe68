use thiserror::Error;

/// Canonical error type for catalog operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity was not found in the catalog.
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Entity type name (e.g. `"collection"`).
        entity: &'static str,
        /// Identifier of the missing entity.
        id: String,
    },

    /// Entity already exists and cannot be created again.
    #[error("{entity} `{id}` already exists")]
    AlreadyExists {
        /// Entity type name (e.g. `"segment"`).
        entity: &'static str,
        /// Identifier that conflicts.
        id: String,
    },

    /// Internal registries disagree with each other. Indicates a sequencing bug.
    #[error("catalog invariant violated: {message}")]
    InvariantViolation {
        /// Human-readable description of the inconsistency.
        message: String,
    },

    /// Configuration could not be loaded or applied.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates an `AlreadyExists` variant.
    #[must_use]
    pub fn already_exists(entity: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates an `InvariantViolation` variant.
    #[must_use]
    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true for errors a load/release command handler may treat as
    /// "already applied" when replaying an instruction.
    #[must_use]
    pub fn is_idempotency_signal(&self) -> bool {
        self.is_not_found() || self.is_already_exists()
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Convenient result alias for catalog operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::not_found("segment", 42u64);
        assert_eq!(err.to_string(), "segment `42` was not found");

        let err = CoreError::already_exists("partition", "7/default");
        assert_eq!(err.to_string(), "partition `7/default` already exists");
    }

    #[test]
    fn test_idempotency_signal() {
        assert!(CoreError::not_found("collection", 1u64).is_idempotency_signal());
        assert!(CoreError::already_exists("collection", 1u64).is_idempotency_signal());
        assert!(!CoreError::invariant_violation("dangling segment").is_idempotency_signal());
        assert!(!CoreError::Configuration("bad".into()).is_idempotency_signal());
    }
}
