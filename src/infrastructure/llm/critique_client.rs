//! HTTP critique service.
//!
//! Talks to a JSON critique endpoint rooted at `llm.base_url`:
//!
//! `POST {base_url}/critique/assess`
//! ```json
//! { "model": "gpt-4o-mini",
//!   "recommendation": { "instruction": "...", "scope": "...", ... },
//!   "context": { "file_path": "...", "family": "..." },
//!   "dimensions": ["actionable", "fixes_issue", "specific", "side_effects"] }
//! ```
//! answered with an assessment where every dimension is optional:
//! ```json
//! { "actionable": { "passed": true, "score": 0.9, "reason": "..." } }
//! ```
//!
//! `POST {base_url}/critique/refine`
//! ```json
//! { "model": "gpt-4o-mini", "recommendation": { ... }, "critique": { ... } }
//! ```
//! answered with `{ "instruction": "..." }`; a null or blank instruction
//! means the service has no rewrite to offer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::JsonClient;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CritiqueResult, LlmAssessment, LlmConfig, QualityDimension, Recommendation, ValidationContext,
};
use crate::domain::ports::CritiqueService;

#[derive(Debug, Serialize)]
struct AssessRequest<'a> {
    model: &'a str,
    recommendation: &'a Recommendation,
    context: &'a ValidationContext,
    dimensions: [QualityDimension; 4],
}

#[derive(Debug, Serialize)]
struct RefineRequest<'a> {
    model: &'a str,
    recommendation: &'a Recommendation,
    critique: &'a CritiqueResult,
}

#[derive(Debug, Deserialize)]
struct RefineResponse {
    #[serde(default)]
    instruction: Option<String>,
}

/// Critique service backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpCritiqueService {
    client: JsonClient,
    model: String,
}

impl HttpCritiqueService {
    /// Build from the `llm` config section. Fails when `base_url` is unset.
    pub fn new(config: &LlmConfig) -> DomainResult<Self> {
        Ok(Self {
            client: JsonClient::from_config(config)?,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CritiqueService for HttpCritiqueService {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn assess(
        &self,
        recommendation: &Recommendation,
        context: &ValidationContext,
    ) -> DomainResult<LlmAssessment> {
        let request = AssessRequest {
            model: &self.model,
            recommendation,
            context,
            dimensions: QualityDimension::ALL,
        };
        let assessment: LlmAssessment = self
            .client
            .post("critique/assess", &request)
            .await
            .map_err(|e| DomainError::CritiqueServiceFailed(e.to_string()))?;

        debug!(recommendation_id = %recommendation.id, "received critique assessment");
        Ok(assessment)
    }

    async fn refine(
        &self,
        recommendation: &Recommendation,
        critique: &CritiqueResult,
    ) -> DomainResult<Option<String>> {
        let request = RefineRequest {
            model: &self.model,
            recommendation,
            critique,
        };
        let response: RefineResponse = self
            .client
            .post("critique/refine", &request)
            .await
            .map_err(|e| DomainError::CritiqueServiceFailed(e.to_string()))?;

        Ok(response
            .instruction
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RecommendationSeverity;
    use crate::services::critic::RecommendationCritic;
    use crate::domain::models::CriticConfig;
    use mockito::{Matcher, Server};
    use std::sync::Arc;

    fn config_for(server: &Server) -> LlmConfig {
        LlmConfig {
            base_url: Some(server.url()),
            api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        }
    }

    fn recommendation() -> Recommendation {
        Recommendation::new(
            "Replace `pip install docval` with `pip install docval==2.1`",
            "## Installation",
            RecommendationSeverity::Medium,
        )
        .with_rationale("Pins the documented version")
    }

    #[tokio::test]
    async fn assess_posts_recommendation_and_parses_verdicts() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/critique/assess")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "recommendation": { "scope": "## Installation" },
                "dimensions": ["actionable", "fixes_issue", "specific", "side_effects"]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "actionable": { "passed": true, "score": 0.9, "reason": "clear verb" },
                    "specific": { "passed": false, "reason": "no line given" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let service = HttpCritiqueService::new(&config_for(&server)).unwrap();
        let assessment = service
            .assess(&recommendation(), &ValidationContext::new())
            .await
            .unwrap();

        mock.assert_async().await;
        let actionable = assessment.actionable.unwrap();
        assert!(actionable.passed);
        assert_eq!(actionable.score, Some(0.9));
        assert!(!assessment.specific.unwrap().passed);
        assert!(assessment.fixes_issue.is_none());
    }

    #[tokio::test]
    async fn server_error_maps_to_service_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/critique/assess")
            .with_status(500)
            .with_body("overloaded")
            .create_async()
            .await;

        let service = HttpCritiqueService::new(&config_for(&server)).unwrap();
        let err = service
            .assess(&recommendation(), &ValidationContext::new())
            .await
            .unwrap_err();

        match err {
            DomainError::CritiqueServiceFailed(message) => {
                assert!(message.contains("500"), "{message}");
                assert!(message.contains("overloaded"), "{message}");
            }
            other => panic!("expected CritiqueServiceFailed, got {other}"),
        }
    }

    #[tokio::test]
    async fn blank_refinement_means_no_suggestion() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/critique/refine")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"instruction": "   "}"#)
            .create_async()
            .await;

        let service = HttpCritiqueService::new(&config_for(&server)).unwrap();
        let critic = RecommendationCritic::new(CriticConfig::default());
        let rec = recommendation();
        let critique = critic.critique(&rec, &ValidationContext::new()).await;

        assert_eq!(service.refine(&rec, &critique).await.unwrap(), None);
    }

    #[tokio::test]
    async fn critic_falls_back_to_rules_when_endpoint_is_down() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/critique/assess")
            .with_status(503)
            .create_async()
            .await;

        let service = Arc::new(HttpCritiqueService::new(&config_for(&server)).unwrap());
        let config = CriticConfig {
            use_llm: true,
            ..CriticConfig::default()
        };
        let with_service = RecommendationCritic::new(config.clone()).with_service(service);
        let rules_only = RecommendationCritic::new(config);

        let rec = recommendation();
        let ctx = ValidationContext::new();
        assert_eq!(
            with_service.critique(&rec, &ctx).await.quality_score,
            rules_only.critique(&rec, &ctx).await.quality_score
        );
    }
}
