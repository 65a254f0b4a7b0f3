// Core structs: ResolutionResult, candidates, feed items, listings and error types
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which cascade stage produced a resolution, or `Fail` when none did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionKind {
    Cache,
    Substitution,
    Exact,
    Fuzzy,
    Partial,
    Wide,
    Ai,
    Fail,
}

impl ResolutionKind {
    pub const ALL: [ResolutionKind; 8] = [
        ResolutionKind::Cache,
        ResolutionKind::Substitution,
        ResolutionKind::Exact,
        ResolutionKind::Fuzzy,
        ResolutionKind::Partial,
        ResolutionKind::Wide,
        ResolutionKind::Ai,
        ResolutionKind::Fail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionKind::Cache => "cache",
            ResolutionKind::Substitution => "substitution",
            ResolutionKind::Exact => "exact",
            ResolutionKind::Fuzzy => "fuzzy",
            ResolutionKind::Partial => "partial",
            ResolutionKind::Wide => "wide",
            ResolutionKind::Ai => "ai",
            ResolutionKind::Fail => "fail",
        }
    }
}

impl fmt::Display for ResolutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one `(brand, model)` pair.
///
/// For every kind except `Fail`, `model` is a catalog model owned by `brand`.
/// On `Fail` both fields carry the post-substitution working values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub brand: String,
    pub model: String,
    pub kind: ResolutionKind,
    /// Score gap between the two best fuzzy candidates, when a fuzzy stage decided.
    pub gap: Option<f64>,
}

impl ResolutionResult {
    pub fn new(brand: impl Into<String>, model: impl Into<String>, kind: ResolutionKind) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
            kind,
            gap: None,
        }
    }

    pub fn failed(brand: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(brand, model, ResolutionKind::Fail)
    }

    pub fn with_gap(mut self, gap: f64) -> Self {
        self.gap = Some(gap);
        self
    }

    /// Callers emit a listing only for usable results.
    pub fn is_usable(&self) -> bool {
        self.kind != ResolutionKind::Fail
    }
}

/// A per-brand fuzzy hit.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub model: String,
    pub score: f64,
}

/// A cross-brand fuzzy hit carrying the model's owning brand.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalCandidate {
    pub brand: String,
    pub model: String,
    pub score: f64,
}

/// One record of a vendor price list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub product_id: String,
    pub brand: String,
    pub model: String,
    pub size: String,
    pub width: String,
    pub height: String,
    pub diameter: String,
    pub season: String,
    pub thorn: String,
    pub artikul: String,
}

/// Marketplace-ready record for a resolved feed item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub id: String,
    pub brand: String,
    pub model: String,
    pub size: String,
    pub tire_section_width: String,
    pub tire_aspect_ratio: String,
    pub rim_diameter: String,
    pub tire_type: String,
    pub artikul: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub resolution: ResolutionKind,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("cannot read substitution rules: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed substitution rules: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI request timed out")]
    Timeout,
    #[error("AI backend responded with status {0}")]
    Status(u16),
    #[error("AI backend returned no message")]
    EmptyResponse,
    #[error("AI answer does not match the schema: {0}")]
    Schema(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    InvalidResponse(u16),
    #[error("cannot write price file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("cannot read price file: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad selector: {0}")]
    Selector(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("cannot write listings: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot serialize listings: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&ResolutionKind::Partial).unwrap();
        assert_eq!(json, "\"partial\"");
        assert_eq!(ResolutionKind::Ai.to_string(), "ai");
    }

    #[test]
    fn only_fail_is_unusable() {
        for kind in ResolutionKind::ALL {
            let result = ResolutionResult::new("Nokian", "Hakkapeliitta 9", kind);
            assert_eq!(result.is_usable(), kind != ResolutionKind::Fail);
        }
    }
}
