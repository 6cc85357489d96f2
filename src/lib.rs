//! docval - tiered documentation validation with recommendation critique
//!
//! Runs pluggable validators over a document in ordinal tiers, stops early
//! when a run accumulates too many critical issues, then scores, refines and
//! deduplicates the recommendations generated from the findings.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the ports validators,
//!   critique services and embedding providers implement
//! - **Service Layer** (`services`): run planning, tier execution, routing,
//!   early termination, critique and deduplication
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging and
//!   HTTP adapters
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use docval::{ValidationRouter, ValidatorRegistry, ValidationContext};
//!
//! let registry = ValidatorRegistry::new().with(Arc::new(YamlValidator));
//! let router = ValidationRouter::new(config.validation, registry)?;
//! let flow = router
//!     .execute(&content, &ValidationContext::new(), None, Some("quick"))
//!     .await?;
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, CritiqueResult, FlowResult, Recommendation, Severity, TierResult, ValidationContext,
    ValidationIssue, ValidatorOutput,
};
pub use domain::ports::{CritiqueService, EmbeddingProvider, Validator};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    Deduplicator, PipelineReport, RecommendationCritic, RecommendationPipeline, RunPlan,
    ValidationRouter, ValidatorRegistry,
};
