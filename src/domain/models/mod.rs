pub mod config;
pub mod context;
pub mod issue;
pub mod recommendation;
pub mod validation;

pub use config::{
    ComparisonField, Config, CriticConfig, CritiqueRules, DedupConfig, DedupMethod,
    EarlyTerminationConfig, LlmConfig, LogFormat, LoggingConfig, QualityWeights, RotationPolicy,
    RoutingOverride, TierDefinition, ValidationConfig, ValidatorDescriptor,
};
pub use context::ValidationContext;
pub use issue::{
    Severity, SeverityCounts, ValidationIssue, CATEGORY_VALIDATOR_ERROR,
    CATEGORY_VALIDATOR_TIMEOUT,
};
pub use recommendation::{
    CritiqueDecision, CritiqueResult, CritiqueSource, DimensionAssessment, LlmAssessment,
    LlmDimensionVerdict, QualityDimension, Recommendation, RecommendationSeverity,
};
pub use validation::{
    FlowResult, RoutingDecision, TierResult, ValidatorOutcome, ValidatorOutput, ValidatorRun,
};
