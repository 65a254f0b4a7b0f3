use super::CatalogModel;
use super::loader::{RawCatalog, load_catalog};
use crate::config::MatchingConfig;
use crate::matcher::normalize::{fold, tokens};
use crate::matcher::token_index::{TokenScorer, search_keys};
use crate::matcher::{FuzzyBackend, build_backend};
use crate::model::{CatalogError, GlobalCandidate, MatchCandidate};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of mapping a vendor brand onto the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandMatch {
    pub name: String,
    /// False when nothing in the catalog matched and `name` is the raw input.
    pub known: bool,
}

struct IndexedBrand {
    keys: Vec<String>,
    name_tokens: Vec<String>,
}

/// Immutable lookup structures over the reference catalog.
pub struct CatalogIndex {
    brands: Vec<String>,
    brand_lookup: HashMap<String, usize>,
    brand_keys: Vec<IndexedBrand>,
    stores: HashMap<String, Vec<String>>,
    exact: HashMap<String, HashMap<String, String>>,
    backend: Box<dyn FuzzyBackend>,
    brand_scorer: TokenScorer,
    model_count: usize,
}

impl CatalogIndex {
    pub fn load(path: &str, config: &MatchingConfig) -> Result<Self, CatalogError> {
        let raw = load_catalog(path)?;
        Self::build(raw, config)
    }

    pub fn build(raw: RawCatalog, config: &MatchingConfig) -> Result<Self, CatalogError> {
        let mut brands: Vec<String> = Vec::new();
        let mut brand_lookup: HashMap<String, usize> = HashMap::new();

        let mut register = |name: &str, brands: &mut Vec<String>| -> Result<String, CatalogError> {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(CatalogError::Invalid("empty brand name".into()));
            }
            let position = *brand_lookup.entry(fold(trimmed)).or_insert_with(|| {
                brands.push(trimmed.to_string());
                brands.len() - 1
            });
            Ok(brands[position].clone())
        };

        for brand in &raw.brands {
            register(brand, &mut brands)?;
        }

        let mut models: Vec<CatalogModel> = Vec::new();
        let mut stores: HashMap<String, Vec<String>> = HashMap::new();
        let mut exact: HashMap<String, HashMap<String, String>> = HashMap::new();

        for block in &raw.models {
            let brand = register(&block.brand, &mut brands)?;
            let store = stores.entry(brand.clone()).or_default();
            let lookup = exact.entry(brand.clone()).or_default();

            for name in &block.models {
                let name = name.trim();
                if name.is_empty() {
                    warn!("Skipping empty model name under brand '{}'", brand);
                    continue;
                }
                if lookup.contains_key(&fold(name)) {
                    debug!("Duplicate catalog model '{}' under '{}'", name, brand);
                    continue;
                }
                lookup.insert(fold(name), name.to_string());
                store.push(name.to_string());
                models.push(CatalogModel::new(&brand, name));
            }
        }

        if models.is_empty() {
            return Err(CatalogError::Invalid("catalog holds no models".into()));
        }

        let brand_keys = brands
            .iter()
            .map(|brand| IndexedBrand {
                keys: search_keys("", brand),
                name_tokens: tokens(brand),
            })
            .collect();
        let backend = build_backend(&models, config);

        info!(
            "Catalog indexed: {} brands, {} models ({} backend)",
            brands.len(),
            models.len(),
            backend.name()
        );

        Ok(Self {
            brands,
            brand_lookup,
            brand_keys,
            stores,
            exact,
            backend,
            brand_scorer: TokenScorer {
                typo_similarity: config.typo_similarity,
            },
            model_count: models.len(),
        })
    }

    pub fn brand_count(&self) -> usize {
        self.brands.len()
    }

    pub fn model_count(&self) -> usize {
        self.model_count
    }

    /// Case-insensitive brand lookup returning the catalog spelling.
    pub fn canonical_brand(&self, brand: &str) -> Option<&str> {
        self.brand_lookup
            .get(&fold(brand))
            .map(|&position| self.brands[position].as_str())
    }

    /// Maps a vendor brand onto the catalog: exact name, then a fuzzy search on the
    /// whole string, then on each word in order. Unmatched brands come back as given.
    pub fn resolve_brand(&self, raw: &str) -> BrandMatch {
        if let Some(name) = self.canonical_brand(raw) {
            return BrandMatch {
                name: name.to_string(),
                known: true,
            };
        }

        let found = self
            .best_brand(raw)
            .or_else(|| raw.split_whitespace().find_map(|chunk| self.best_brand(chunk)));

        match found {
            Some(position) => BrandMatch {
                name: self.brands[position].clone(),
                known: true,
            },
            None => BrandMatch {
                name: raw.trim().to_string(),
                known: false,
            },
        }
    }

    fn best_brand(&self, query: &str) -> Option<usize> {
        let query_tokens = tokens(query);
        let mut best: Option<(usize, f64)> = None;
        for (position, brand) in self.brand_keys.iter().enumerate() {
            let Some(score) = self
                .brand_scorer
                .score(&query_tokens, &brand.keys, &brand.name_tokens)
            else {
                continue;
            };
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((position, score));
            }
        }
        best.map(|(position, _)| position)
    }

    /// Models of a canonical brand in catalog order.
    pub fn models_of(&self, brand: &str) -> &[String] {
        self.stores.get(brand).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Case-insensitive equality against the brand's models.
    pub fn exact_lookup(&self, brand: &str, model: &str) -> Option<&str> {
        self.exact
            .get(brand)
            .and_then(|lookup| lookup.get(&fold(model)))
            .map(String::as_str)
    }

    pub fn fuzzy_search(&self, brand: &str, query: &str) -> Vec<MatchCandidate> {
        self.backend.fuzzy_search(brand, query)
    }

    pub fn global_fuzzy_search(&self, query: &str) -> Vec<GlobalCandidate> {
        self.backend.global_fuzzy_search(query)
    }
}
