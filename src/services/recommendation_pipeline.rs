//! Critique and deduplication of a generated recommendation batch.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::domain::models::{Recommendation, ValidationContext};
use crate::services::critic::RecommendationCritic;
use crate::services::deduplicator::Deduplicator;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub original_count: usize,
    pub discarded_count: usize,
    pub refined_count: usize,
    pub duplicates_removed: usize,
    pub final_count: usize,
}

/// Final recommendation set plus statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub recommendations: Vec<Recommendation>,
    pub stats: PipelineStats,
}

/// Runs the critic, then the deduplicator.
#[derive(Debug, Clone)]
pub struct RecommendationPipeline {
    critic: RecommendationCritic,
    deduplicator: Deduplicator,
    dedup_enabled: bool,
}

impl RecommendationPipeline {
    pub const fn new(
        critic: RecommendationCritic,
        deduplicator: Deduplicator,
        dedup_enabled: bool,
    ) -> Self {
        Self {
            critic,
            deduplicator,
            dedup_enabled,
        }
    }

    #[instrument(skip_all, fields(count = recommendations.len()))]
    pub async fn run(
        &self,
        recommendations: Vec<Recommendation>,
        context: &ValidationContext,
    ) -> PipelineReport {
        let mut stats = PipelineStats {
            original_count: recommendations.len(),
            ..PipelineStats::default()
        };

        let critiqued = if self.critic.config().enabled {
            let outcome = self.critic.process(recommendations, context).await;
            stats.discarded_count = outcome.discarded_count;
            stats.refined_count = outcome.refined_count;
            outcome.recommendations
        } else {
            recommendations
        };

        let before_dedupe = critiqued.len();
        let recommendations = if self.dedup_enabled {
            self.deduplicator.dedupe(critiqued).await
        } else {
            critiqued
        };
        stats.duplicates_removed = before_dedupe - recommendations.len();
        stats.final_count = recommendations.len();

        info!(
            original = stats.original_count,
            discarded = stats.discarded_count,
            refined = stats.refined_count,
            duplicates = stats.duplicates_removed,
            kept = stats.final_count,
            "Recommendation pipeline finished"
        );

        PipelineReport {
            recommendations,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CriticConfig, DedupConfig, RecommendationSeverity};

    fn rec(instruction: &str, scope: &str) -> Recommendation {
        Recommendation::new(instruction, scope, RecommendationSeverity::Medium)
            .with_rationale("Reported by the link checker")
    }

    fn batch() -> Vec<Recommendation> {
        vec![
            rec("Replace the dead link to /docs/v1/install with /docs/v2/install", "## Setup"),
            rec("Replace the dead link to /docs/v1/install with /docs/v2/install.", "## Setup"),
            Recommendation::new("Consider it", "document", RecommendationSeverity::Low),
            rec("review and fix the heading", "## Installation"),
        ]
    }

    #[tokio::test]
    async fn stats_add_up() {
        let pipeline = RecommendationPipeline::new(
            RecommendationCritic::new(CriticConfig::default()),
            Deduplicator::new(DedupConfig::default()),
            true,
        );

        let report = pipeline.run(batch(), &ValidationContext::new()).await;
        let stats = report.stats;

        assert_eq!(stats.original_count, 4);
        assert_eq!(stats.discarded_count, 1);
        assert_eq!(stats.refined_count, 1);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(stats.final_count, 2);
        assert_eq!(report.recommendations.len(), 2);
        assert!(report.recommendations.iter().all(|r| r.quality_score.is_some()));
    }

    #[tokio::test]
    async fn disabled_stages_pass_through() {
        let pipeline = RecommendationPipeline::new(
            RecommendationCritic::new(CriticConfig {
                enabled: false,
                ..CriticConfig::default()
            }),
            Deduplicator::new(DedupConfig::default()),
            false,
        );

        let report = pipeline.run(batch(), &ValidationContext::new()).await;
        assert_eq!(report.stats.final_count, 4);
        assert_eq!(report.stats.discarded_count, 0);
        assert!(report.recommendations.iter().all(|r| r.quality_score.is_none()));
    }
}
