//! Recommendation deduplication.
//!
//! Pairs whose similarity reaches the threshold are unioned into clusters
//! (transitively), and each cluster keeps a single representative: highest
//! `quality_score`, then earliest `created_at`, then earliest input position.
//! Retained items keep their input order, so running the deduplicator on its
//! own output changes nothing.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::models::{ComparisonField, DedupConfig, DedupMethod, Recommendation};
use crate::domain::ports::EmbeddingProvider;

/// Calculate cosine similarity between two embedding vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Lowercase and collapse whitespace.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Disjoint-set forest over input positions.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the smaller index as root for stable cluster ids.
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// Pairwise similarity for one dedupe call.
struct Similarity {
    method: DedupMethod,
    texts: Vec<String>,
    vectors: Option<Vec<Vec<f32>>>,
}

impl Similarity {
    fn between(&self, i: usize, j: usize) -> f64 {
        match (self.method, &self.vectors) {
            (DedupMethod::Semantic, Some(v)) => cosine_similarity(&v[i], &v[j]),
            (DedupMethod::Exact, _) => {
                if self.texts[i] == self.texts[j] {
                    1.0
                } else {
                    0.0
                }
            }
            _ => strsim::normalized_levenshtein(&self.texts[i], &self.texts[j]),
        }
    }
}

/// Merges near-duplicate recommendations.
#[derive(Clone)]
pub struct Deduplicator {
    config: DedupConfig,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("config", &self.config)
            .field("embeddings", &self.embeddings.as_ref().map(|e| e.name()))
            .finish()
    }
}

impl Deduplicator {
    pub const fn new(config: DedupConfig) -> Self {
        Self {
            config,
            embeddings: None,
        }
    }

    /// Attach an embedding provider for the semantic method.
    pub fn with_embeddings(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(provider);
        self
    }

    /// Normalized comparison text of one recommendation.
    pub fn comparison_text(&self, recommendation: &Recommendation) -> String {
        let parts: Vec<&str> = self
            .config
            .fields
            .iter()
            .filter_map(|field| match field {
                ComparisonField::Instruction => Some(recommendation.instruction.as_str()),
                ComparisonField::Scope => Some(recommendation.scope.as_str()),
                ComparisonField::Rationale => recommendation.rationale.as_deref(),
                ComparisonField::ProposedContent => recommendation.proposed_content.as_deref(),
            })
            .collect();
        normalize(&parts.join(" "))
    }

    /// Remove near-duplicates, keeping one representative per cluster.
    pub async fn dedupe(&self, recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
        if recommendations.len() < 2 {
            return recommendations;
        }

        let texts: Vec<String> = recommendations
            .iter()
            .map(|r| self.comparison_text(r))
            .collect();
        let similarity = self.similarity_matrix(texts).await;

        let n = recommendations.len();
        let mut clusters = UnionFind::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                if similarity.between(i, j) >= self.config.similarity_threshold {
                    clusters.union(i, j);
                }
            }
        }

        // Representative per cluster root.
        let mut keeper: Vec<Option<usize>> = vec![None; n];
        for i in 0..n {
            let root = clusters.find(i);
            keeper[root] = match keeper[root] {
                Some(current) if !prefer(&recommendations[i], &recommendations[current]) => {
                    Some(current)
                }
                _ => Some(i),
            };
        }

        let kept: Vec<bool> = (0..n)
            .map(|i| keeper[clusters.find(i)] == Some(i))
            .collect();
        let result: Vec<Recommendation> = recommendations
            .into_iter()
            .zip(kept)
            .filter_map(|(rec, keep)| {
                if !keep {
                    debug!(recommendation_id = %rec.id, "Dropping duplicate recommendation");
                }
                keep.then_some(rec)
            })
            .collect();

        info!(
            method = ?self.config.method,
            before = n,
            after = result.len(),
            "Deduplicated recommendations"
        );
        result
    }

    /// Pairwise similarity over `texts`, by the configured method.
    async fn similarity_matrix(&self, texts: Vec<String>) -> Similarity {
        let vectors = match self.config.method {
            DedupMethod::Semantic => self.embed(&texts).await,
            DedupMethod::Exact | DedupMethod::Fuzzy => None,
        };
        let method = match (self.config.method, &vectors) {
            (DedupMethod::Semantic, None) => DedupMethod::Fuzzy,
            (method, _) => method,
        };
        Similarity {
            method,
            texts,
            vectors,
        }
    }

    async fn embed(&self, texts: &[String]) -> Option<Vec<Vec<f32>>> {
        let Some(provider) = &self.embeddings else {
            warn!("Semantic deduplication without an embedding provider, using fuzzy matching");
            return None;
        };
        match provider.embed_batch(texts).await {
            Ok(vectors) if vectors.len() == texts.len() => Some(vectors),
            Ok(vectors) => {
                warn!(
                    provider = provider.name(),
                    expected = texts.len(),
                    got = vectors.len(),
                    "Embedding count mismatch, using fuzzy matching"
                );
                None
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Embedding failed, using fuzzy matching");
                None
            }
        }
    }
}

/// Whether `candidate` (later in input) should replace `current` as the
/// cluster representative.
fn prefer(candidate: &Recommendation, current: &Recommendation) -> bool {
    let score = |r: &Recommendation| r.quality_score.unwrap_or(0.0);
    match score(candidate)
        .partial_cmp(&score(current))
        .unwrap_or(Ordering::Equal)
    {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.created_at < current.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{DomainError, DomainResult};
    use crate::domain::models::RecommendationSeverity;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    fn rec(instruction: &str, scope: &str, score: Option<f64>) -> Recommendation {
        let mut r = Recommendation::new(instruction, scope, RecommendationSeverity::Medium);
        r.quality_score = score;
        r
    }

    fn instructions(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.instruction.as_str()).collect()
    }

    /// Maps texts mentioning "badge" to one direction, everything else to another.
    struct KeywordEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbeddings {
        fn name(&self) -> &'static str {
            "keyword"
        }

        async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
            Ok(if text.contains("badge") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            })
        }
    }

    struct FailingEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbeddings {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn embed(&self, _text: &str) -> DomainResult<Vec<f32>> {
            Err(DomainError::EmbeddingFailed("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn fuzzy_keeps_highest_scoring_member_in_input_order() {
        let dedup = Deduplicator::new(DedupConfig::default());
        let input = vec![
            rec("Fix the broken link to the install guide", "## Setup", Some(0.7)),
            rec("Add alt text to the architecture diagram", "## Overview", Some(0.9)),
            rec("Fix the broken link to the install guides", "## Setup", Some(0.8)),
        ];

        let out = dedup.dedupe(input).await;
        assert_eq!(
            instructions(&out),
            vec![
                "Add alt text to the architecture diagram",
                "Fix the broken link to the install guides",
            ]
        );
    }

    #[tokio::test]
    async fn ties_prefer_earliest_creation_then_position() {
        let dedup = Deduplicator::new(DedupConfig {
            method: DedupMethod::Exact,
            ..DedupConfig::default()
        });
        let now = Utc::now();
        let newer = rec("Same", "## A", None).with_created_at(now);
        let older = rec("same ", "## a", None).with_created_at(now - Duration::seconds(5));
        let older_id = older.id;

        let out = dedup.dedupe(vec![newer, older]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, older_id);

        let first = rec("Same", "## A", Some(0.5)).with_created_at(now);
        let second = rec("Same", "## A", Some(0.5)).with_created_at(now);
        let first_id = first.id;
        let out = dedup.dedupe(vec![first, second]).await;
        assert_eq!(out[0].id, first_id);
    }

    #[tokio::test]
    async fn clusters_are_transitive() {
        let dedup = Deduplicator::new(DedupConfig {
            similarity_threshold: 0.92,
            fields: vec![ComparisonField::Instruction],
            ..DedupConfig::default()
        });
        // a~b and b~c clear the threshold, a~c does not.
        let a = rec("abcdefghijklmnopqrst", "x", Some(0.1));
        let b = rec("abcdefghijklmnopqrsu", "x", Some(0.2));
        let c = rec("abcdefghijklmnopqruu", "x", Some(0.3));
        assert!(strsim::normalized_levenshtein(&a.instruction, &c.instruction) < 0.92);

        let out = dedup.dedupe(vec![a, b, c]).await;
        assert_eq!(instructions(&out), vec!["abcdefghijklmnopqruu"]);
    }

    #[tokio::test]
    async fn semantic_uses_embeddings_and_falls_back_to_fuzzy() {
        let config = DedupConfig {
            method: DedupMethod::Semantic,
            ..DedupConfig::default()
        };
        let input = vec![
            rec("Remove the stale build badge", "README", Some(0.9)),
            rec("Update the coverage badge URL", "README", Some(0.8)),
            rec("Document the --verbose flag", "## CLI", Some(0.7)),
        ];

        let semantic = Deduplicator::new(config.clone())
            .with_embeddings(Arc::new(KeywordEmbeddings))
            .dedupe(input.clone())
            .await;
        assert_eq!(semantic.len(), 2);

        let fallback = Deduplicator::new(config.clone())
            .with_embeddings(Arc::new(FailingEmbeddings))
            .dedupe(input.clone())
            .await;
        assert_eq!(fallback.len(), 3);

        let no_provider = Deduplicator::new(config).dedupe(input).await;
        assert_eq!(no_provider.len(), 3);
    }

    #[test]
    fn comparison_text_is_normalized() {
        let dedup = Deduplicator::new(DedupConfig::default());
        let r = rec("  Fix   THE Link ", "## Setup\n", None);
        assert_eq!(dedup.comparison_text(&r), "fix the link ## setup");
    }

    #[test]
    fn cosine_similarity_handles_degenerate_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
