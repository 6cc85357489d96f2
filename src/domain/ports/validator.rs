//! Validator port.
//!
//! A validator inspects document content and reports issues. Implementations
//! live outside this crate (YAML, structure, code, link and semantic checks);
//! the scheduler only sees this trait.

use async_trait::async_trait;

use crate::domain::models::{ValidationContext, ValidatorOutput};

/// A pluggable unit of validation work.
///
/// Implementations must not mutate shared state: the content and context are
/// shared read-only between validators running concurrently in the same tier.
/// Returning an error, panicking or exceeding the timeout is non-fatal to the
/// tier; the scheduler records it as a synthetic issue.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Identifier matching the `id` of a configured validator descriptor.
    fn id(&self) -> &str;

    /// Validate `content` and report issues.
    async fn validate(
        &self,
        content: &str,
        context: &ValidationContext,
    ) -> anyhow::Result<ValidatorOutput>;
}
