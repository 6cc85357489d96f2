//! Recommendation critic.
//!
//! Scores generated recommendations on four weighted quality dimensions,
//! discards the weak ones, refines the middling ones in a bounded loop and
//! passes the rest through with their final score attached.
//!
//! Rule checks always run. When `use_llm` is set and a [`CritiqueService`] is
//! attached, its verdicts tighten the rule verdicts; service errors and
//! timeouts fall back to rules alone.

pub mod refiner;
pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::domain::models::{
    CriticConfig, CritiqueResult, CritiqueSource, DimensionAssessment, LlmAssessment,
    LlmDimensionVerdict, QualityDimension, Recommendation, ValidationContext,
};
use crate::domain::ports::CritiqueService;

/// Result of critiquing a batch.
#[derive(Debug, Clone, Default)]
pub struct CriticOutcome {
    /// Kept recommendations, in input order, each with its final score.
    pub recommendations: Vec<Recommendation>,
    pub discarded_count: usize,
    /// Kept recommendations whose final version came from refinement.
    pub refined_count: usize,
    pub accepted_count: usize,
}

/// Per-item verdict inside a batch.
enum Processed {
    Kept {
        recommendation: Recommendation,
        refined: bool,
    },
    Discarded,
}

/// Round to six decimals so boundary comparisons are exact.
fn round_score(score: f64) -> f64 {
    (score * 1_000_000.0).round() / 1_000_000.0
}

/// Combine a rule verdict with the service verdict for the same dimension.
fn merge_verdict(
    rule: DimensionAssessment,
    llm: Option<&LlmDimensionVerdict>,
    allow_graded: bool,
) -> DimensionAssessment {
    let Some(llm) = llm else {
        return rule;
    };

    let passed = rule.passed && llm.passed;
    let reason = if rule.passed && !llm.passed {
        format!("llm: {}", llm.reason)
    } else {
        rule.reason
    };
    let score = match (passed, allow_graded, llm.score) {
        (false, _, _) => 0.0,
        (true, true, Some(graded)) => rule.score.min(graded.clamp(0.0, 1.0)),
        (true, _, _) => rule.score,
    };

    DimensionAssessment {
        passed,
        reason,
        score,
    }
}

/// Scores, refines and filters recommendations.
#[derive(Clone)]
pub struct RecommendationCritic {
    config: CriticConfig,
    service: Option<Arc<dyn CritiqueService>>,
}

impl std::fmt::Debug for RecommendationCritic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationCritic")
            .field("config", &self.config)
            .field("service", &self.service.as_ref().map(|s| s.name()))
            .finish()
    }
}

impl RecommendationCritic {
    pub const fn new(config: CriticConfig) -> Self {
        Self {
            config,
            service: None,
        }
    }

    /// Attach an external critique service. It is only consulted when
    /// `use_llm` is set.
    pub fn with_service(mut self, service: Arc<dyn CritiqueService>) -> Self {
        self.service = Some(service);
        self
    }

    pub const fn config(&self) -> &CriticConfig {
        &self.config
    }

    fn active_service(&self) -> Option<&Arc<dyn CritiqueService>> {
        self.service.as_ref().filter(|_| self.config.use_llm)
    }

    fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.config.llm_timeout_secs)
    }

    async fn llm_assessment(
        &self,
        recommendation: &Recommendation,
        context: &ValidationContext,
    ) -> Option<LlmAssessment> {
        let service = self.active_service()?;
        match tokio::time::timeout(self.llm_timeout(), service.assess(recommendation, context))
            .await
        {
            Ok(Ok(assessment)) => Some(assessment),
            Ok(Err(e)) => {
                warn!(service = service.name(), error = %e, "Critique service failed, using rules only");
                None
            }
            Err(_) => {
                warn!(
                    service = service.name(),
                    timeout_secs = self.config.llm_timeout_secs,
                    "Critique service timed out, using rules only"
                );
                None
            }
        }
    }

    /// Score one recommendation.
    pub async fn critique(
        &self,
        recommendation: &Recommendation,
        context: &ValidationContext,
    ) -> CritiqueResult {
        let rules = &self.config.rules;
        let llm = self.llm_assessment(recommendation, context).await;
        let source = if llm.is_some() {
            CritiqueSource::RulesAndLlm
        } else {
            CritiqueSource::Rules
        };

        let assess = |dimension: QualityDimension| {
            merge_verdict(
                rules::check(dimension, recommendation, rules),
                llm.as_ref().and_then(|a| a.dimension(dimension)),
                self.config.allow_graded_scores,
            )
        };
        let actionable = assess(QualityDimension::Actionable);
        let fixes_issue = assess(QualityDimension::FixesIssue);
        let specific = assess(QualityDimension::Specific);
        let side_effects = assess(QualityDimension::SideEffects);

        let weights = &self.config.weights;
        let quality_score = round_score(
            weights.actionable * actionable.score
                + weights.fixes_issue * fixes_issue.score
                + weights.specific * specific.score
                + weights.side_effects * side_effects.score,
        );
        let should_discard = quality_score < self.config.discard_threshold;
        let needs_refinement = !should_discard && quality_score < self.config.quality_threshold;

        debug!(
            recommendation_id = %recommendation.id,
            quality_score,
            should_discard,
            needs_refinement,
            "Critiqued recommendation"
        );

        CritiqueResult {
            actionable,
            fixes_issue,
            specific,
            side_effects,
            quality_score,
            should_discard,
            needs_refinement,
            source,
        }
    }

    /// Produce an improved copy of `recommendation`.
    ///
    /// Prefers a service rewrite of the instruction when available; otherwise
    /// applies rule-based fixes for the failed dimensions.
    pub async fn refine(
        &self,
        recommendation: &Recommendation,
        critique: &CritiqueResult,
    ) -> Recommendation {
        if let Some(service) = self.active_service() {
            match tokio::time::timeout(self.llm_timeout(), service.refine(recommendation, critique))
                .await
            {
                Ok(Ok(Some(instruction))) if !instruction.trim().is_empty() => {
                    let mut refined = recommendation.clone();
                    refined.instruction = instruction.trim().to_string();
                    refined.revision += 1;
                    return refined;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!(service = service.name(), error = %e, "Refinement service failed, using rules");
                }
                Err(_) => {
                    warn!(service = service.name(), "Refinement service timed out, using rules");
                }
            }
        }
        refiner::refine_with_rules(recommendation, critique, &self.config.rules)
    }

    /// Critique, refine and filter one recommendation.
    ///
    /// At most `max_iterations` refinements; the best-scoring version seen is
    /// kept. A refinement that falls below the discard threshold ends the
    /// loop without replacing the best version.
    async fn process_one(
        &self,
        recommendation: Recommendation,
        context: &ValidationContext,
    ) -> Processed {
        let mut critique = self.critique(&recommendation, context).await;
        if critique.should_discard {
            info!(
                recommendation_id = %recommendation.id,
                quality_score = critique.quality_score,
                failed = ?critique.failed_dimensions(),
                "Discarding recommendation"
            );
            return Processed::Discarded;
        }

        let original_revision = recommendation.revision;
        let mut best_score = critique.quality_score;
        let mut best = recommendation.clone();
        let mut current = recommendation;

        let mut iteration = 0;
        while critique.needs_refinement && iteration < self.config.max_iterations {
            iteration += 1;
            let candidate = self.refine(&current, &critique).await;
            let candidate_critique = self.critique(&candidate, context).await;
            debug!(
                recommendation_id = %candidate.id,
                iteration,
                quality_score = candidate_critique.quality_score,
                "Refinement scored"
            );

            if candidate_critique.should_discard {
                break;
            }
            if candidate_critique.quality_score > best_score {
                best_score = candidate_critique.quality_score;
                best = candidate.clone();
            }
            current = candidate;
            critique = candidate_critique;
        }

        best.quality_score = Some(best_score);
        Processed::Kept {
            refined: best.revision > original_revision,
            recommendation: best,
        }
    }

    /// Critique a batch. Items are processed concurrently up to
    /// `batch_concurrency`; output order follows input order.
    #[instrument(skip_all, fields(count = recommendations.len()))]
    pub async fn process(
        &self,
        recommendations: Vec<Recommendation>,
        context: &ValidationContext,
    ) -> CriticOutcome {
        let concurrency = self.config.batch_concurrency.max(1);
        let processed: Vec<Processed> = stream::iter(recommendations)
            .map(|rec| self.process_one(rec, context))
            .buffered(concurrency)
            .collect()
            .await;

        let mut outcome = CriticOutcome::default();
        for item in processed {
            match item {
                Processed::Kept {
                    recommendation,
                    refined,
                } => {
                    if refined {
                        outcome.refined_count += 1;
                    }
                    outcome.recommendations.push(recommendation);
                }
                Processed::Discarded => outcome.discarded_count += 1,
            }
        }
        outcome.accepted_count = outcome.recommendations.len();

        info!(
            kept = outcome.accepted_count,
            discarded = outcome.discarded_count,
            refined = outcome.refined_count,
            "Critique finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{DomainError, DomainResult};
    use crate::domain::models::{CritiqueDecision, RecommendationSeverity};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GOOD: &str = "Replace `Document.Save(path)` with `Document.Save(path, SaveFormat.Docx)`";

    fn rec(instruction: &str, scope: &str) -> Recommendation {
        Recommendation::new(instruction, scope, RecommendationSeverity::Medium)
    }

    fn critic() -> RecommendationCritic {
        RecommendationCritic::new(CriticConfig::default())
    }

    /// Fails `actionable` and `specific`, rewrites to the same weak text,
    /// and counts calls.
    struct Stubborn {
        assessments: AtomicUsize,
        refinements: AtomicUsize,
    }

    impl Stubborn {
        fn new() -> Self {
            Self {
                assessments: AtomicUsize::new(0),
                refinements: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CritiqueService for Stubborn {
        fn name(&self) -> &'static str {
            "stubborn"
        }

        async fn assess(
            &self,
            _recommendation: &Recommendation,
            _context: &ValidationContext,
        ) -> DomainResult<LlmAssessment> {
            self.assessments.fetch_add(1, Ordering::SeqCst);
            let fail = || LlmDimensionVerdict {
                passed: false,
                score: None,
                reason: "unclear".to_string(),
            };
            Ok(LlmAssessment {
                actionable: Some(fail()),
                specific: Some(fail()),
                ..Default::default()
            })
        }

        async fn refine(
            &self,
            recommendation: &Recommendation,
            _critique: &CritiqueResult,
        ) -> DomainResult<Option<String>> {
            self.refinements.fetch_add(1, Ordering::SeqCst);
            Ok(Some(recommendation.instruction.clone()))
        }
    }

    struct Broken;

    #[async_trait]
    impl CritiqueService for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn assess(
            &self,
            _recommendation: &Recommendation,
            _context: &ValidationContext,
        ) -> DomainResult<LlmAssessment> {
            Err(DomainError::CritiqueServiceFailed("502 Bad Gateway".to_string()))
        }

        async fn refine(
            &self,
            _recommendation: &Recommendation,
            _critique: &CritiqueResult,
        ) -> DomainResult<Option<String>> {
            Err(DomainError::CritiqueServiceFailed("502 Bad Gateway".to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl CritiqueService for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn assess(
            &self,
            _recommendation: &Recommendation,
            _context: &ValidationContext,
        ) -> DomainResult<LlmAssessment> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Ok(LlmAssessment::default())
        }

        async fn refine(
            &self,
            _recommendation: &Recommendation,
            _critique: &CritiqueResult,
        ) -> DomainResult<Option<String>> {
            Ok(None)
        }
    }

    /// Passes everything with a graded actionable score.
    struct Graded(f64);

    #[async_trait]
    impl CritiqueService for Graded {
        fn name(&self) -> &'static str {
            "graded"
        }

        async fn assess(
            &self,
            _recommendation: &Recommendation,
            _context: &ValidationContext,
        ) -> DomainResult<LlmAssessment> {
            Ok(LlmAssessment {
                actionable: Some(LlmDimensionVerdict {
                    passed: true,
                    score: Some(self.0),
                    reason: "mostly clear".to_string(),
                }),
                ..Default::default()
            })
        }

        async fn refine(
            &self,
            _recommendation: &Recommendation,
            _critique: &CritiqueResult,
        ) -> DomainResult<Option<String>> {
            Ok(None)
        }
    }

    fn llm_config() -> CriticConfig {
        CriticConfig {
            use_llm: true,
            ..CriticConfig::default()
        }
    }

    #[tokio::test]
    async fn critique_is_deterministic() {
        let critic = critic();
        let recommendation = rec("review and fix the heading", "## Install").with_rationale("typo");
        let ctx = ValidationContext::new();

        let first = critic.critique(&recommendation, &ctx).await;
        let second = critic.critique(&recommendation, &ctx).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn vague_instruction_is_routed_to_refinement() {
        let critic = critic();
        let recommendation =
            rec("review and fix the heading", "## Install").with_rationale("Heading has a typo");
        let result = critic.critique(&recommendation, &ValidationContext::new()).await;

        assert!(!result.actionable.passed);
        assert!(!result.specific.passed);
        assert!((result.quality_score - 0.5).abs() < f64::EPSILON);
        assert_eq!(result.decision(), CritiqueDecision::Refine);
    }

    #[tokio::test]
    async fn score_at_discard_threshold_is_refined_not_discarded() {
        // Only actionable passes: 0.3.
        let result = critic()
            .critique(&rec("Delete all images", "## Gallery"), &ValidationContext::new())
            .await;
        assert!((result.quality_score - 0.3).abs() < f64::EPSILON);
        assert_eq!(result.decision(), CritiqueDecision::Refine);

        // Only specific passes: 0.2.
        let below = critic()
            .critique(
                &rec("Consider removing all of the obsolete screenshots below", "## Gallery")
                    .with_content_change("![old](old.png)", ""),
                &ValidationContext::new(),
            )
            .await;
        assert!((below.quality_score - 0.2).abs() < f64::EPSILON);
        assert_eq!(below.decision(), CritiqueDecision::Discard);
    }

    #[tokio::test]
    async fn score_at_quality_threshold_is_accepted() {
        // Everything but fixes_issue: 0.3 + 0.2 + 0.2 rounds to exactly 0.7.
        let result = critic()
            .critique(&rec(GOOD, "code block under ## Saving"), &ValidationContext::new())
            .await;
        assert!((result.quality_score - 0.7).abs() < f64::EPSILON);
        assert_eq!(result.decision(), CritiqueDecision::Accept);
    }

    #[tokio::test]
    async fn refinement_is_bounded_and_keeps_best_candidate() {
        let service = Arc::new(Stubborn::new());
        let critic = RecommendationCritic::new(llm_config()).with_service(service.clone());
        let recommendation = rec(GOOD, "code block under ## Saving").with_rationale("API changed");

        let outcome = critic
            .process(vec![recommendation], &ValidationContext::new())
            .await;

        assert_eq!(service.refinements.load(Ordering::SeqCst), 2);
        assert_eq!(service.assessments.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.recommendations.len(), 1);
        assert_eq!(outcome.discarded_count, 0);
        // Refinements never scored higher, so the original is kept.
        assert_eq!(outcome.refined_count, 0);
        assert_eq!(outcome.recommendations[0].revision, 0);
        assert_eq!(outcome.recommendations[0].quality_score, Some(0.5));
    }

    #[tokio::test]
    async fn rule_refinement_lifts_vague_recommendation() {
        let outcome = critic()
            .process(
                vec![rec("review and fix the heading", "## Installation").with_rationale("Typo")],
                &ValidationContext::new(),
            )
            .await;

        assert_eq!(outcome.refined_count, 1);
        let kept = &outcome.recommendations[0];
        assert_eq!(kept.instruction, "Fix the heading in ## Installation");
        assert_eq!(kept.quality_score, Some(1.0));
        assert_eq!(kept.revision, 1);
    }

    #[tokio::test]
    async fn non_ascii_batch_is_processed_without_dropping_items() {
        let outcome = critic()
            .process(
                vec![
                    rec("\u{23a}consider\u{e9}\u{212a}\u{23a}", "## R\u{e9}sum\u{e9}")
                        .with_rationale("Vague wording"),
                    rec(GOOD, "code block under ## Saving").with_rationale("API changed"),
                ],
                &ValidationContext::new(),
            )
            .await;

        assert_eq!(
            outcome.recommendations.len() + outcome.discarded_count,
            2
        );
        assert!(outcome
            .recommendations
            .iter()
            .all(|r| !r.instruction.to_lowercase().contains("consider")));
    }

    #[tokio::test]
    async fn service_failure_falls_back_to_rules() {
        let recommendation = rec(GOOD, "code block under ## Saving").with_rationale("API changed");
        let ctx = ValidationContext::new();

        let fallback = RecommendationCritic::new(llm_config())
            .with_service(Arc::new(Broken))
            .critique(&recommendation, &ctx)
            .await;
        let rules_only = critic().critique(&recommendation, &ctx).await;

        assert_eq!(fallback.source, CritiqueSource::Rules);
        assert_eq!(fallback, rules_only);
    }

    #[tokio::test(start_paused = true)]
    async fn service_timeout_falls_back_to_rules() {
        let result = RecommendationCritic::new(llm_config())
            .with_service(Arc::new(Slow))
            .critique(&rec(GOOD, "code block under ## Saving"), &ValidationContext::new())
            .await;
        assert_eq!(result.source, CritiqueSource::Rules);
    }

    #[tokio::test]
    async fn service_is_ignored_unless_enabled() {
        let service = Arc::new(Stubborn::new());
        let critic = RecommendationCritic::new(CriticConfig::default()).with_service(service.clone());
        critic
            .critique(&rec(GOOD, "code block under ## Saving"), &ValidationContext::new())
            .await;
        assert_eq!(service.assessments.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn graded_scores_only_count_when_allowed() {
        let recommendation = rec(GOOD, "code block under ## Saving").with_rationale("API changed");
        let ctx = ValidationContext::new();

        let boolean = RecommendationCritic::new(llm_config())
            .with_service(Arc::new(Graded(0.5)))
            .critique(&recommendation, &ctx)
            .await;
        assert!((boolean.quality_score - 1.0).abs() < f64::EPSILON);

        let graded = RecommendationCritic::new(CriticConfig {
            allow_graded_scores: true,
            ..llm_config()
        })
        .with_service(Arc::new(Graded(0.5)))
        .critique(&recommendation, &ctx)
        .await;
        assert!((graded.quality_score - 0.85).abs() < f64::EPSILON);
        assert_eq!(graded.source, CritiqueSource::RulesAndLlm);
    }

    #[tokio::test]
    async fn batch_preserves_order_and_counts() {
        let batch = vec![
            rec(GOOD, "code block under ## Saving").with_rationale("API changed"),
            rec("Consider it", "document"),
            rec("review and fix the heading", "## Installation").with_rationale("Typo"),
        ];
        let first_id = batch[0].id;
        let third_id = batch[2].id;

        let outcome = critic().process(batch, &ValidationContext::new()).await;

        assert_eq!(outcome.discarded_count, 1);
        assert_eq!(outcome.accepted_count, 2);
        assert_eq!(outcome.recommendations[0].id, first_id);
        assert_eq!(outcome.recommendations[1].id, third_id);
    }
}
