//! Critique service port for semantic recommendation scoring.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CritiqueResult, LlmAssessment, Recommendation, ValidationContext};

/// External scoring service consulted by the critic when `use_llm` is set.
///
/// Failures are never fatal: the critic falls back to rule-based scoring.
#[async_trait]
pub trait CritiqueService: Send + Sync {
    /// Service name (e.g., "http", "mock").
    fn name(&self) -> &'static str;

    /// Assess a recommendation along the quality dimensions.
    async fn assess(
        &self,
        recommendation: &Recommendation,
        context: &ValidationContext,
    ) -> DomainResult<LlmAssessment>;

    /// Propose an improved instruction. `Ok(None)` means the service has no
    /// suggestion and rule-based refinement applies.
    async fn refine(
        &self,
        recommendation: &Recommendation,
        critique: &CritiqueResult,
    ) -> DomainResult<Option<String>>;
}
