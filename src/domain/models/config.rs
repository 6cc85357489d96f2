use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::recommendation::QualityDimension;

/// Main configuration structure for docval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Tier layout, validators, profiles and family overrides
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Recommendation critic settings
    #[serde(default)]
    pub critic: CriticConfig,

    /// Recommendation deduplication settings
    #[serde(default)]
    pub dedup: DedupConfig,

    /// External LLM service used for semantic critique and embeddings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Validation topology
// ---------------------------------------------------------------------------

/// Validation scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ValidationConfig {
    /// Fallback timeout for validators without a validator or tier timeout
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Profile applied when the caller does not name one
    #[serde(default)]
    pub default_profile: Option<String>,

    /// Failure budget across tiers
    #[serde(default)]
    pub early_termination: EarlyTerminationConfig,

    /// Ordered stages
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierDefinition>,

    /// Validator descriptors
    #[serde(default = "default_validators")]
    pub validators: Vec<ValidatorDescriptor>,

    /// Named profiles
    #[serde(default = "default_profiles")]
    pub profiles: BTreeMap<String, RoutingOverride>,

    /// Overrides keyed by document family
    #[serde(default)]
    pub families: BTreeMap<String, RoutingOverride>,
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_tiers() -> Vec<TierDefinition> {
    vec![
        TierDefinition::new("tier1", 1, &["yaml", "markdown", "structure"], true)
            .with_timeout(60),
        TierDefinition::new("tier2", 2, &["code", "links", "seo"], true).with_timeout(120),
        TierDefinition::new("tier3", 3, &["fuzzy_logic", "truth", "llm"], false)
            .with_timeout(300),
    ]
}

fn default_validators() -> Vec<ValidatorDescriptor> {
    vec![
        ValidatorDescriptor::new("yaml"),
        ValidatorDescriptor::new("markdown"),
        ValidatorDescriptor::new("structure"),
        ValidatorDescriptor::new("code"),
        ValidatorDescriptor::new("links").with_timeout(45),
        ValidatorDescriptor::new("seo"),
        ValidatorDescriptor::new("fuzzy_logic"),
        ValidatorDescriptor::new("truth").depends_on(&["fuzzy_logic"]),
        ValidatorDescriptor::new("llm")
            .depends_on(&["truth"])
            .with_timeout(120),
    ]
}

fn default_profiles() -> BTreeMap<String, RoutingOverride> {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        "quick".to_string(),
        RoutingOverride {
            tiers: BTreeMap::from([("tier2".to_string(), false), ("tier3".to_string(), false)]),
            ..Default::default()
        },
    );
    profiles.insert("full".to_string(), RoutingOverride::default());
    profiles.insert(
        "strict".to_string(),
        RoutingOverride {
            max_critical_errors: Some(1),
            ..Default::default()
        },
    );
    profiles
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            default_profile: None,
            early_termination: EarlyTerminationConfig::default(),
            tiers: default_tiers(),
            validators: default_validators(),
            profiles: default_profiles(),
            families: BTreeMap::new(),
        }
    }
}

impl ValidationConfig {
    /// An empty layout, used as a starting point by builders and tests.
    pub fn empty() -> Self {
        Self {
            tiers: Vec::new(),
            validators: Vec::new(),
            profiles: BTreeMap::new(),
            ..Self::default()
        }
    }

    pub fn with_tier(mut self, tier: TierDefinition) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn with_validator(mut self, validator: ValidatorDescriptor) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_profile(mut self, name: impl Into<String>, profile: RoutingOverride) -> Self {
        self.profiles.insert(name.into(), profile);
        self
    }

    pub fn with_family(mut self, name: impl Into<String>, family: RoutingOverride) -> Self {
        self.families.insert(name.into(), family);
        self
    }

    pub fn validator(&self, id: &str) -> Option<&ValidatorDescriptor> {
        self.validators.iter().find(|v| v.id == id)
    }

    /// Tiers in execution (ordinal) order.
    pub fn ordered_tiers(&self) -> Vec<&TierDefinition> {
        let mut tiers: Vec<&TierDefinition> = self.tiers.iter().collect();
        tiers.sort_by_key(|t| t.ordinal);
        tiers
    }

    /// Tier that lists the given validator.
    pub fn tier_of(&self, validator_id: &str) -> Option<&TierDefinition> {
        self.tiers
            .iter()
            .find(|t| t.validators.iter().any(|v| v == validator_id))
    }
}

/// An ordinal stage of the validation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TierDefinition {
    pub name: String,

    /// Position in the pipeline; lower runs first
    pub ordinal: u32,

    /// Validator ids, in declaration order
    #[serde(default)]
    pub validators: Vec<String>,

    /// Fan out all validators at once instead of following dependencies
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Budget for the whole tier
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Global default enable flag
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl TierDefinition {
    pub fn new(name: impl Into<String>, ordinal: u32, validators: &[&str], parallel: bool) -> Self {
        Self {
            name: name.into(),
            ordinal,
            validators: validators.iter().map(|v| (*v).to_string()).collect(),
            parallel,
            timeout_secs: None,
            enabled: true,
        }
    }

    pub const fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A validator declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ValidatorDescriptor {
    pub id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Validators that must complete first
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ValidatorDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            timeout_secs: None,
            depends_on: Vec::new(),
        }
    }

    pub const fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| (*d).to_string()).collect();
        self
    }

    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Failure budget settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EarlyTerminationConfig {
    #[serde(default = "default_true")]
    pub early_termination_on_critical: bool,

    #[serde(default = "default_max_critical_errors")]
    pub max_critical_errors: usize,

    /// Treat an exceeded tier timeout as a stop trigger
    #[serde(default = "default_true")]
    pub stop_on_tier_timeout: bool,
}

const fn default_max_critical_errors() -> usize {
    3
}

impl Default for EarlyTerminationConfig {
    fn default() -> Self {
        Self {
            early_termination_on_critical: true,
            max_critical_errors: default_max_critical_errors(),
            stop_on_tier_timeout: true,
        }
    }
}

/// Profile or family override layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoutingOverride {
    /// Tier name -> enabled
    #[serde(default)]
    pub tiers: BTreeMap<String, bool>,

    /// Validator id -> enabled
    #[serde(default)]
    pub validators: BTreeMap<String, bool>,

    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    #[serde(default)]
    pub early_termination_on_critical: Option<bool>,

    #[serde(default)]
    pub max_critical_errors: Option<usize>,

    #[serde(default)]
    pub stop_on_tier_timeout: Option<bool>,
}

// ---------------------------------------------------------------------------
// Critic
// ---------------------------------------------------------------------------

/// Recommendation critic configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CriticConfig {
    /// When false, recommendations pass through unscored
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Supplement rule checks with the external critique service
    #[serde(default)]
    pub use_llm: bool,

    /// Let graded LLM sub-scores feed the weighted sum
    #[serde(default)]
    pub allow_graded_scores: bool,

    #[serde(default = "default_discard_threshold")]
    pub discard_threshold: f64,

    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,

    /// Upper bound on refine() calls per recommendation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Recommendations critiqued concurrently within a batch
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    #[serde(default)]
    pub weights: QualityWeights,

    #[serde(default)]
    pub rules: CritiqueRules,
}

const fn default_discard_threshold() -> f64 {
    0.3
}

const fn default_quality_threshold() -> f64 {
    0.7
}

const fn default_max_iterations() -> u32 {
    2
}

const fn default_batch_concurrency() -> usize {
    4
}

const fn default_llm_timeout_secs() -> u64 {
    30
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_llm: false,
            allow_graded_scores: false,
            discard_threshold: default_discard_threshold(),
            quality_threshold: default_quality_threshold(),
            max_iterations: default_max_iterations(),
            batch_concurrency: default_batch_concurrency(),
            llm_timeout_secs: default_llm_timeout_secs(),
            weights: QualityWeights::default(),
            rules: CritiqueRules::default(),
        }
    }
}

/// Weight of each quality dimension; must sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QualityWeights {
    pub actionable: f64,
    pub fixes_issue: f64,
    pub specific: f64,
    pub side_effects: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            actionable: 0.3,
            fixes_issue: 0.3,
            specific: 0.2,
            side_effects: 0.2,
        }
    }
}

impl QualityWeights {
    pub const fn weight(&self, dimension: QualityDimension) -> f64 {
        match dimension {
            QualityDimension::Actionable => self.actionable,
            QualityDimension::FixesIssue => self.fixes_issue,
            QualityDimension::Specific => self.specific,
            QualityDimension::SideEffects => self.side_effects,
        }
    }

    pub fn sum(&self) -> f64 {
        QualityDimension::ALL.iter().map(|d| self.weight(*d)).sum()
    }

    /// Each weight in [0, 1] and the total within 1e-6 of 1.0.
    pub fn is_valid(&self) -> bool {
        QualityDimension::ALL
            .iter()
            .all(|d| (0.0..=1.0).contains(&self.weight(*d)))
            && (self.sum() - 1.0).abs() <= 1e-6
    }
}

/// Rule-based critique parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CritiqueRules {
    /// Vague phrases that make an instruction non-actionable
    #[serde(default = "default_banned_phrases")]
    pub banned_phrases: Vec<String>,

    /// Phrases signalling a change with broad side effects
    #[serde(default = "default_risky_phrases")]
    pub risky_phrases: Vec<String>,

    /// Scopes too broad to be specific
    #[serde(default = "default_generic_scopes")]
    pub generic_scopes: Vec<String>,

    #[serde(default = "default_min_instruction_length")]
    pub min_instruction_length: usize,

    #[serde(default = "default_max_instruction_length")]
    pub max_instruction_length: usize,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_banned_phrases() -> Vec<String> {
    to_strings(&[
        "review and fix",
        "consider",
        "might want to",
        "look into",
        "as needed",
        "if necessary",
        "etc.",
        "make sure",
        "check if",
        "double-check",
    ])
}

fn default_risky_phrases() -> Vec<String> {
    to_strings(&[
        "delete all",
        "remove all",
        "rewrite the entire",
        "replace all",
        "remove the entire",
    ])
}

fn default_generic_scopes() -> Vec<String> {
    to_strings(&[
        "all",
        "everywhere",
        "entire document",
        "whole file",
        "global",
        "document",
    ])
}

const fn default_min_instruction_length() -> usize {
    30
}

const fn default_max_instruction_length() -> usize {
    500
}

impl Default for CritiqueRules {
    fn default() -> Self {
        Self {
            banned_phrases: default_banned_phrases(),
            risky_phrases: default_risky_phrases(),
            generic_scopes: default_generic_scopes(),
            min_instruction_length: default_min_instruction_length(),
            max_instruction_length: default_max_instruction_length(),
        }
    }
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// Similarity method used by the deduplicator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMethod {
    Exact,
    #[default]
    Fuzzy,
    Semantic,
}

/// Recommendation field compared during deduplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonField {
    Instruction,
    Scope,
    Rationale,
    ProposedContent,
}

/// Deduplication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DedupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub method: DedupMethod,

    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "default_comparison_fields")]
    pub fields: Vec<ComparisonField>,
}

const fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_comparison_fields() -> Vec<ComparisonField> {
    vec![ComparisonField::Instruction, ComparisonField::Scope]
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: DedupMethod::default(),
            similarity_threshold: default_similarity_threshold(),
            fields: default_comparison_fields(),
        }
    }
}

// ---------------------------------------------------------------------------
// LLM service
// ---------------------------------------------------------------------------

/// External critique / embedding service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// Base URL; the service is not used when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key. Falls back to `DOCVAL_LLM_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_critique_model")]
    pub model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_llm_request_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_critique_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_llm_request_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: default_critique_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_llm_request_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Log file rotation policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub enable_stderr: bool,

    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            enable_stderr: true,
            rotation: RotationPolicy::default(),
        }
    }
}

const fn default_true() -> bool {
    true
}
