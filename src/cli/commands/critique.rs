//! Critique CLI command: score, refine and deduplicate recommendations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, DedupMethod, Recommendation, ValidationContext};
use crate::infrastructure::llm::{HttpCritiqueService, HttpEmbeddingProvider};
use crate::services::{
    Deduplicator, PipelineReport, PipelineStats, RecommendationCritic, RecommendationPipeline,
};

#[derive(Args, Debug)]
pub struct CritiqueArgs {
    /// JSON file holding an array of recommendations
    #[arg(short, long)]
    pub input: PathBuf,

    /// Write the full report as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path of the document the recommendations were generated for
    #[arg(long)]
    pub file_path: Option<String>,

    /// Document family
    #[arg(short, long)]
    pub family: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CritiqueOutput {
    pub report: PipelineReport,
}

impl CommandOutput for CritiqueOutput {
    fn to_human(&self) -> String {
        let PipelineStats {
            original_count,
            discarded_count,
            refined_count,
            duplicates_removed,
            final_count,
        } = self.report.stats;

        let mut lines = vec![format!(
            "{original_count} in, {discarded_count} discarded, {refined_count} refined, \
             {duplicates_removed} duplicates removed, {final_count} kept"
        )];

        if self.report.recommendations.is_empty() {
            lines.push("No recommendations kept.".to_string());
            return lines.join("\n");
        }

        let mut table = list_table(&["score", "rev", "severity", "scope", "instruction"]);
        for rec in &self.report.recommendations {
            table.add_row(vec![
                rec.quality_score
                    .map_or_else(|| "-".to_string(), |s| format!("{s:.2}")),
                rec.revision.to_string(),
                rec.severity.to_string(),
                truncate(&rec.scope, 24),
                truncate(&rec.instruction, 72),
            ]);
        }
        lines.push(String::new());
        lines.push(table.to_string());
        lines.join("\n")
    }
}

/// Build the pipeline from configuration, attaching HTTP services when the
/// `llm` section has a base URL and the relevant feature asks for them.
pub fn build_pipeline(config: &Config) -> Result<RecommendationPipeline> {
    let llm_configured = config.llm.base_url.is_some();

    let mut critic = RecommendationCritic::new(config.critic.clone());
    if config.critic.use_llm {
        if llm_configured {
            let service = HttpCritiqueService::new(&config.llm)
                .context("Failed to create critique service")?;
            critic = critic.with_service(Arc::new(service));
        } else {
            warn!("critic.use_llm is set but llm.base_url is not; using rules only");
        }
    }

    let mut deduplicator = Deduplicator::new(config.dedup.clone());
    if config.dedup.method == DedupMethod::Semantic && llm_configured {
        let provider = HttpEmbeddingProvider::new(&config.llm)
            .context("Failed to create embedding provider")?;
        deduplicator = deduplicator.with_embeddings(Arc::new(provider));
    }

    Ok(RecommendationPipeline::new(
        critic,
        deduplicator,
        config.dedup.enabled,
    ))
}

pub async fn execute(args: CritiqueArgs, config: &Config, json_mode: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let recommendations: Vec<Recommendation> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse recommendations in {}", args.input.display()))?;

    let mut context = ValidationContext::new();
    context.file_path = args.file_path;
    context.family = args.family;

    let pipeline = build_pipeline(config)?;
    let report = pipeline.run(recommendations, &context).await;

    if let Some(ref path) = args.output {
        let body = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote critique report");
    }

    output(&CritiqueOutput { report }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BATCH: &str = r###"[
        {
            "instruction": "Replace `docval==1.0` with `docval==2.1` in the install command",
            "scope": "## Installation",
            "rationale": "The documented version was yanked",
            "severity": "high",
            "confidence": 0.9
        },
        {
            "instruction": "Replace `docval==1.0` with `docval==2.1` in the install command.",
            "scope": "## Installation",
            "rationale": "The documented version was yanked",
            "severity": "high",
            "confidence": 0.8
        },
        {
            "instruction": "Consider it",
            "scope": "document",
            "severity": "low",
            "confidence": 0.1
        }
    ]"###;

    #[tokio::test]
    async fn critique_writes_report_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("recs.json");
        let report_path = dir.path().join("report.json");
        std::fs::write(&input, BATCH).unwrap();

        let args = CritiqueArgs {
            input,
            output: Some(report_path.clone()),
            file_path: Some("docs/install.md".to_string()),
            family: None,
        };
        execute(args, &Config::default(), true).await.unwrap();

        let report: PipelineReport =
            serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(report.stats.original_count, 3);
        assert_eq!(report.stats.discarded_count, 1);
        assert_eq!(report.stats.duplicates_removed, 1);
        assert_eq!(report.stats.final_count, 1);
        assert_eq!(report.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let args = CritiqueArgs {
            input: PathBuf::from("/nonexistent/recs.json"),
            output: None,
            file_path: None,
            family: None,
        };
        let err = execute(args, &Config::default(), true).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read"));
    }

    #[test]
    fn llm_without_base_url_falls_back_to_rules() {
        let mut config = Config::default();
        config.critic.use_llm = true;
        config.dedup.method = DedupMethod::Semantic;

        assert!(build_pipeline(&config).is_ok());
    }
}
