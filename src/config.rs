use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;

/// Fuzzy backend used by the catalog index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Token,
    Similarity,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub backend: BackendKind,
    /// Gap between the two best candidates under which a match is logged as a close call.
    pub ambiguity_gap_threshold: f64,
    /// Shortest token suffix the partial and wide stages will still query.
    pub partial_min_tail: usize,
    pub token_min_score: f64,
    pub similarity_min_score: f64,
    /// Jaro-Winkler floor for treating two long tokens as a typo of each other.
    pub typo_similarity: f64,
    pub max_candidates: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Token,
            ambiguity_gap_threshold: 0.05,
            partial_min_tail: 2,
            token_min_score: 0.3,
            similarity_min_score: 0.85,
            typo_similarity: 0.92,
            max_candidates: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub use_cache: bool,
    pub partial_search: bool,
    pub wide_search: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            partial_search: true,
            wide_search: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    /// Failed answers tolerated per query text before the model is no longer asked.
    pub retry_budget: u32,
    /// Token-filtered shortlists this small are replaced by the whole brand store.
    pub min_shortlist: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:11434".into(),
            model: "llama3.2:1b-instruct-fp16".into(),
            timeout_seconds: 30,
            retry_budget: 2,
            min_shortlist: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog_path: String,
    pub substitutes_path: String,
    pub downloads_dir: String,
    pub output_path: String,
    pub database_path: String,
    pub price_files: Vec<String>,
    /// When set, price files are downloaded from here before each run.
    pub price_base_url: Option<String>,
    pub image_base_url: Option<String>,
    /// Run once when unset.
    pub check_interval_seconds: Option<u64>,
    pub matching: MatchingConfig,
    pub resolver: ResolverConfig,
    pub ai: AiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: "settings/catalog.json".into(),
            substitutes_path: "settings/substitutes.json".into(),
            downloads_dir: "downloads".into(),
            output_path: "public/listings.json".into(),
            database_path: "data.db".into(),
            price_files: Vec::new(),
            price_base_url: None,
            image_base_url: None,
            check_interval_seconds: None,
            matching: MatchingConfig::default(),
            resolver: ResolverConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
