//! Domain errors for the docval validation and critique pipeline.

use thiserror::Error;

/// Format a cycle path as a human-readable string: `a -> b -> c -> a`.
fn format_cycle_path(path: &[String]) -> String {
    let mut parts: Vec<&str> = path.iter().map(String::as_str).collect();
    if let Some(first) = path.first() {
        parts.push(first);
    }
    parts.join(" -> ")
}

/// Domain-level errors.
///
/// Configuration variants are fatal and are raised before any validator
/// executes. Validator failures never surface here; they are folded into the
/// tier result as synthetic issues.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validator dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<String>),

    #[error("Unknown validator referenced by {context}: {id}")]
    UnknownValidator { id: String, context: String },

    #[error("Validator '{validator}' depends on '{dependency}', which runs in a later tier")]
    DependencyOutOfOrder { validator: String, dependency: String },

    #[error("Validator '{0}' is declared more than once")]
    DuplicateValidator(String),

    #[error("Tier ordinal {ordinal} is used by both '{first}' and '{second}'")]
    DuplicateTierOrdinal {
        ordinal: u32,
        first: String,
        second: String,
    },

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Quality weights must each be in [0, 1] and sum to 1.0 (got {0:.4})")]
    InvalidWeights(f64),

    #[error("Invalid threshold {name}: {value}")]
    InvalidThreshold { name: String, value: f64 },

    #[error("No implementation registered for validator: {0}")]
    MissingImplementation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Critique service failed: {0}")]
    CritiqueServiceFailed(String),

    #[error("Embedding provider failed: {0}")]
    EmbeddingFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    /// Whether this error describes a configuration problem detected before
    /// execution.
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::DependencyCycle(_)
                | Self::UnknownValidator { .. }
                | Self::DependencyOutOfOrder { .. }
                | Self::DuplicateValidator(_)
                | Self::DuplicateTierOrdinal { .. }
                | Self::UnknownProfile(_)
                | Self::InvalidWeights(_)
                | Self::InvalidThreshold { .. }
                | Self::MissingImplementation(_)
                | Self::InvalidConfig(_)
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
