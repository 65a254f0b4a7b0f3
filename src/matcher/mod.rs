// Matcher module: pluggable fuzzy backends over the catalog.

pub mod normalize;
pub mod similarity;
pub mod token_index;

use crate::catalog::CatalogModel;
use crate::config::{BackendKind, MatchingConfig};
use crate::model::{GlobalCandidate, MatchCandidate};
use similarity::SimilarityIndex;
use std::cmp::Ordering;
use token_index::TokenIndex;

/// Fuzzy search capability the cascade runs against. Results are ordered best first.
pub trait FuzzyBackend: Send + Sync {
    fn name(&self) -> &'static str;
    /// Searches only the models of `brand` (a canonical catalog brand).
    fn fuzzy_search(&self, brand: &str, query: &str) -> Vec<MatchCandidate>;
    fn global_fuzzy_search(&self, query: &str) -> Vec<GlobalCandidate>;
}

pub fn build_backend(models: &[CatalogModel], config: &MatchingConfig) -> Box<dyn FuzzyBackend> {
    match config.backend {
        BackendKind::Token => Box::new(TokenIndex::build(models, config)),
        BackendKind::Similarity => Box::new(SimilarityIndex::build(models, config)),
    }
}

/// Best score first; ties go to the shorter name, then to catalog order.
fn rank_hits(hits: &mut [(usize, f64)], name_len: impl Fn(usize) -> usize) {
    hits.sort_by(|left, right| {
        right
            .1
            .partial_cmp(&left.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| name_len(left.0).cmp(&name_len(right.0)))
            .then_with(|| left.0.cmp(&right.0))
    });
}
