//! Whole-string Jaro-Winkler backend. Tolerant of reordered characters and
//! typos but blind to token structure, so noise words lower the score instead
//! of rejecting the candidate.

use super::normalize::{compact, normalize};
use super::{FuzzyBackend, rank_hits};
use crate::catalog::CatalogModel;
use crate::config::MatchingConfig;
use crate::model::{GlobalCandidate, MatchCandidate};
use std::collections::HashMap;

struct SimilarModel {
    brand: String,
    name: String,
    normalized: String,
    combined: String,
    compact: String,
}

pub struct SimilarityIndex {
    models: Vec<SimilarModel>,
    by_brand: HashMap<String, Vec<usize>>,
    min_score: f64,
    max_candidates: usize,
}

impl SimilarityIndex {
    pub fn build(models: &[CatalogModel], config: &MatchingConfig) -> Self {
        let mut indexed = Vec::with_capacity(models.len());
        let mut by_brand: HashMap<String, Vec<usize>> = HashMap::new();

        for (position, model) in models.iter().enumerate() {
            indexed.push(SimilarModel {
                brand: model.brand.clone(),
                name: model.name.clone(),
                normalized: normalize(&model.name),
                combined: normalize(&format!("{} {}", model.brand, model.name)),
                compact: compact(&model.name),
            });
            by_brand.entry(model.brand.clone()).or_default().push(position);
        }

        Self {
            models: indexed,
            by_brand,
            min_score: config.similarity_min_score,
            max_candidates: config.max_candidates,
        }
    }

    fn search<'a>(&self, positions: impl Iterator<Item = &'a usize>, query: &str) -> Vec<(usize, f64)> {
        let normalized = normalize(query);
        if normalized.is_empty() {
            return Vec::new();
        }
        let compacted = normalized.replace(' ', "");

        let mut hits: Vec<(usize, f64)> = positions
            .filter_map(|&position| {
                let model = &self.models[position];
                let score = strsim::jaro_winkler(&normalized, &model.normalized)
                    .max(strsim::jaro_winkler(&normalized, &model.combined))
                    .max(strsim::jaro_winkler(&compacted, &model.compact));
                (score >= self.min_score).then_some((position, score))
            })
            .collect();

        rank_hits(&mut hits, |position| self.models[position].name.len());
        hits.truncate(self.max_candidates);
        hits
    }
}

impl FuzzyBackend for SimilarityIndex {
    fn name(&self) -> &'static str {
        "similarity"
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
