pub mod critic;
pub mod deduplicator;
pub mod dependency_resolver;
pub mod early_termination;
pub mod recommendation_pipeline;
pub mod run_plan;
pub mod tier_executor;
pub mod validation_router;
pub mod validator_registry;

pub use critic::{CriticOutcome, RecommendationCritic};
pub use deduplicator::Deduplicator;
pub use dependency_resolver::{DependencyMap, DependencyResolver};
pub use early_termination::{EarlyTerminationController, StopDecision};
pub use recommendation_pipeline::{PipelineReport, PipelineStats, RecommendationPipeline};
pub use run_plan::{validate_topology, PlannedValidator, RunPlan, TierPlan};
pub use tier_executor::{TierExecution, TierExecutor};
pub use validation_router::ValidationRouter;
pub use validator_registry::ValidatorRegistry;
