//! Recommendation pipeline tests across critic and deduplicator.

mod common;

use common::good_recommendation;
use docval::domain::models::{
    CritiqueDecision, CriticConfig, DedupConfig, DedupMethod, Recommendation,
    RecommendationSeverity, ValidationContext,
};
use docval::{Deduplicator, RecommendationCritic, RecommendationPipeline};

fn pipeline(dedup: DedupConfig) -> RecommendationPipeline {
    RecommendationPipeline::new(
        RecommendationCritic::new(CriticConfig::default()),
        Deduplicator::new(dedup),
        true,
    )
}

#[tokio::test]
async fn vague_heading_fix_is_refined_rather_than_discarded() {
    let critic = RecommendationCritic::new(CriticConfig::default());
    let rec = Recommendation::new(
        "review and fix the heading",
        "## Installation",
        RecommendationSeverity::Medium,
    )
    .with_rationale("Heading level skips from h1 to h3");

    let critique = critic.critique(&rec, &ValidationContext::new()).await;
    assert!(!critique.actionable.passed);
    assert!(critique.quality_score <= 0.7);
    assert_eq!(critique.decision(), CritiqueDecision::Refine);

    let report = pipeline(DedupConfig::default())
        .run(vec![rec], &ValidationContext::new())
        .await;
    assert_eq!(report.stats.discarded_count, 0);
    assert_eq!(report.stats.refined_count, 1);

    let refined = &report.recommendations[0];
    assert!(refined.revision >= 1);
    assert!(!refined.instruction.to_lowercase().contains("review and fix"));
    assert!(refined.quality_score.unwrap() > critique.quality_score);
}

#[tokio::test]
async fn mixed_batch_produces_consistent_stats() {
    let batch = vec![
        good_recommendation(
            "Change the heading `### Usage` to `## Usage` to restore the hierarchy",
            "## Usage",
        ),
        good_recommendation(
            "Change the heading `### Usage` to `## Usage` to restore hierarchy",
            "## Usage",
        ),
        good_recommendation(
            "Add the missing `timeout_secs` key to the YAML example block",
            "code block under ## Configuration",
        ),
        Recommendation::new("Consider it", "document", RecommendationSeverity::Low),
    ];

    let report = pipeline(DedupConfig::default())
        .run(batch, &ValidationContext::new())
        .await;

    let stats = report.stats;
    assert_eq!(stats.original_count, 4);
    assert_eq!(stats.discarded_count, 1);
    assert_eq!(stats.duplicates_removed, 1);
    assert_eq!(stats.final_count, 2);
    assert_eq!(
        stats.original_count - stats.discarded_count - stats.duplicates_removed,
        stats.final_count
    );
    assert!(report
        .recommendations
        .iter()
        .all(|r| r.quality_score.is_some_and(|s| s >= 0.7)));
}

#[tokio::test]
async fn exact_method_keeps_near_duplicates() {
    let batch = vec![
        good_recommendation("Replace `http://` with `https://` in the badge link", "README header"),
        good_recommendation("Replace `http://` with `https://` in the badge link.", "README header"),
    ];
    let dedup = DedupConfig {
        method: DedupMethod::Exact,
        ..DedupConfig::default()
    };

    let report = pipeline(dedup).run(batch, &ValidationContext::new()).await;
    assert_eq!(report.stats.duplicates_removed, 0);
    assert_eq!(report.recommendations.len(), 2);
}

#[tokio::test]
async fn report_serializes_with_stats() {
    let report = pipeline(DedupConfig::default())
        .run(
            vec![good_recommendation(
                "Add alt text describing the architecture diagram",
                "image under ## Overview",
            )],
            &ValidationContext::new(),
        )
        .await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["stats"]["final_count"], 1);
    assert_eq!(json["recommendations"][0]["scope"], "image under ## Overview");
}
