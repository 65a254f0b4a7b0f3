//! Token index: every query token must hit some key of a model, where a hit is an
//! exact token, a prefix, a substring of a token or compact form, or a close typo.

use super::normalize::{compact, tokens};
use super::{FuzzyBackend, rank_hits};
use crate::catalog::CatalogModel;
use crate::config::MatchingConfig;
use crate::model::{GlobalCandidate, MatchCandidate};
use std::collections::HashMap;

const EXACT_HIT: f64 = 1.0;
const PREFIX_HIT: f64 = 0.9;
const SUBSTRING_HIT: f64 = 0.75;
const TYPO_WEIGHT: f64 = 0.7;
const TYPO_MIN_LEN: usize = 5;
const QUALITY_WEIGHT: f64 = 0.7;

/// Scores a tokenized query against a set of search keys.
#[derive(Debug, Clone, Copy)]
pub struct TokenScorer {
    pub typo_similarity: f64,
}

impl TokenScorer {
    fn token_score(&self, query_token: &str, key: &str) -> f64 {
        if key == query_token {
            EXACT_HIT
        } else if key.starts_with(query_token) {
            PREFIX_HIT
        } else if key.contains(query_token) {
            SUBSTRING_HIT
        } else if query_token.chars().count() >= TYPO_MIN_LEN && key.chars().count() >= TYPO_MIN_LEN {
            let similarity = strsim::jaro_winkler(query_token, key);
            if similarity >= self.typo_similarity {
                similarity * TYPO_WEIGHT
            } else {
                0.0
            }
        } else {
            0.0
        }
    }

    /// Returns `None` unless every query token hits a key. The score blends the
    /// average hit quality with how many of the name's own tokens the query covers,
    /// so `"hakkapeliitta 9"` ranks `"Hakkapeliitta 9"` above `"Hakkapeliitta 9 SUV"`.
    pub fn score(&self, query: &[String], keys: &[String], name_tokens: &[String]) -> Option<f64> {
        if query.is_empty() || name_tokens.is_empty() {
            return None;
        }

        let mut quality = 0.0;
        for query_token in query {
            let best = keys
                .iter()
                .map(|key| self.token_score(query_token, key))
                .fold(0.0, f64::max);
            if best <= 0.0 {
                return None;
            }
            quality += best;
        }
        quality /= query.len() as f64;

        let covered = name_tokens
            .iter()
            .filter(|token| {
                query
                    .iter()
                    .any(|q| q.contains(token.as_str()) || token.starts_with(q.as_str()))
            })
            .count();
        let coverage = covered as f64 / name_tokens.len() as f64;

        Some(QUALITY_WEIGHT * quality + (1.0 - QUALITY_WEIGHT) * coverage)
    }
}

/// Search keys for a name: its tokens, the owner's tokens and both compact forms.
pub fn search_keys(owner: &str, name: &str) -> Vec<String> {
    let mut keys = tokens(name);
    keys.extend(tokens(owner));
    keys.push(compact(name));
    keys.push(compact(&format!("{} {}", owner, name)));
    keys.retain(|key| !key.is_empty());
    keys.sort();
    keys.dedup();
    keys
}

#[derive(Debug, Clone)]
struct IndexedModel {
    brand: String,
    name: String,
    name_tokens: Vec<String>,
    keys: Vec<String>,
}

pub struct TokenIndex {
    models: Vec<IndexedModel>,
    by_brand: HashMap<String, Vec<usize>>,
    scorer: TokenScorer,
    min_score: f64,
    max_candidates: usize,
}

impl TokenIndex {
    pub fn build(models: &[CatalogModel], config: &MatchingConfig) -> Self {
        let mut indexed = Vec::with_capacity(models.len());
        let mut by_brand: HashMap<String, Vec<usize>> = HashMap::new();

        for (position, model) in models.iter().enumerate() {
            indexed.push(IndexedModel {
                brand: model.brand.clone(),
                name: model.name.clone(),
                name_tokens: tokens(&model.name),
                keys: search_keys(&model.brand, &model.name),
            });
            by_brand.entry(model.brand.clone()).or_default().push(position);
        }

        Self {
            models: indexed,
            by_brand,
            scorer: TokenScorer {
                typo_similarity: config.typo_similarity,
            },
            min_score: config.token_min_score,
            max_candidates: config.max_candidates,
        }
    }

    fn search<'a>(&self, positions: impl Iterator<Item = &'a usize>, query: &str) -> Vec<(usize, f64)> {
        let query_tokens = tokens(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(usize, f64)> = positions
            .filter_map(|&position| {
                let model = &self.models[position];
                self.scorer
                    .score(&query_tokens, &model.keys, &model.name_tokens)
                    .filter(|score| *score >= self.min_score)
                    .map(|score| (position, score))
            })
            .collect();

        rank_hits(&mut hits, |position| self.models[position].name.len());
        hits.truncate(self.max_candidates);
        hits
    }
}

impl FuzzyBackend for TokenIndex {
    fn name(&self) -> &'static str {
        "token"
    }

    fn fuzzy_search(&self, brand: &str, query: &str) -> Vec<MatchCandidate> {
        let Some(positions) = self.by_brand.get(brand) else {
            return Vec::new();
        };
        self.search(positions.iter(), query)
            .into_iter()
            .map(|(position, score)| MatchCandidate {
                model: self.models[position].name.clone(),
                score,
            })
            .collect()
    }

    fn global_fuzzy_search(&self, query: &str) -> Vec<GlobalCandidate> {
        let all: Vec<usize> = (0..self.models.len()).collect();
        self.search(all.iter(), query)
            .into_iter()
            .map(|(position, score)| GlobalCandidate {
                brand: self.models[position].brand.clone(),
                model: self.models[position].name.clone(),
                score,
            })
            .collect()
    }
}
