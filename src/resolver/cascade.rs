use super::Resolver;
use super::substitution::Substitution;
use crate::ai::AiVerdict;
use crate::catalog::BrandMatch;
use crate::model::{ResolutionKind, ResolutionResult};
use tracing::{debug, info};

/// Tails of `model` with leading tokens dropped, longest first, down to `min_tail` tokens.
/// Single-token models have no suffixes.
pub fn token_suffixes(model: &str, min_tail: usize) -> Vec<String> {
    let words: Vec<&str> = model.split_whitespace().collect();
    let mut suffixes = Vec::new();
    let mut start = 1;
    while start < words.len() && words.len() - start >= min_tail {
        suffixes.push(words[start..].join(" "));
        start += 1;
    }
    suffixes
}

impl Resolver {
    /// Runs exact, fuzzy, partial, wide and AI in order; the first hit wins.
    pub(super) async fn run_cascade(&mut self, substitution: &Substitution) -> ResolutionResult {
        let brand = self.working_brand(substitution);
        let model = substitution.model.as_str();

        if brand.known {
            if let Some(result) = self.exact_stage(&brand.name, model, substitution.model_overridden) {
                return result;
            }
            if let Some(result) = self.fuzzy_stage(&brand.name, model) {
                return result;
            }
            if self.partial_search {
                if let Some(result) = self.partial_stage(&brand.name, model) {
                    return result;
                }
            }
        } else {
            debug!("Brand '{}' not in catalog; skipping per-brand stages", brand.name);
        }

        // A rule-pinned brand is final, so a cross-brand hit could only contradict it.
        if self.wide_search && !substitution.brand_pinned {
            if let Some(result) = self.wide_stage(model) {
                return result;
            }
        }

        if brand.known {
            if let Some(result) = self.ai_stage(&brand.name, model).await {
                return result;
            }
        }

        debug!("No match for {} / {}", substitution.brand, substitution.model);
        ResolutionResult::failed(&substitution.brand, &substitution.model)
    }

    fn working_brand(&mut self, substitution: &Substitution) -> BrandMatch {
        if substitution.brand_pinned {
            return match self.index.canonical_brand(&substitution.brand) {
                Some(name) => BrandMatch {
                    name: name.to_string(),
                    known: true,
                },
                None => BrandMatch {
                    name: substitution.brand.clone(),
                    known: false,
                },
            };
        }
        self.resolve_brand(&substitution.brand)
    }

    fn exact_stage(&mut self, brand: &str, model: &str, overridden: bool) -> Option<ResolutionResult> {
        self.index_queries += 1;
        let found = self.index.exact_lookup(brand, model)?;
        let kind = if overridden {
            ResolutionKind::Substitution
        } else {
            ResolutionKind::Exact
        };
        Some(ResolutionResult::new(brand, found, kind))
    }

    /// Takes the top candidate and annotates it with the gap to the runner-up.
    fn fuzzy_pick(&mut self, brand: &str, query: &str, kind: ResolutionKind) -> Option<ResolutionResult> {
        self.index_queries += 1;
        let candidates = self.index.fuzzy_search(brand, query);
        let top = candidates.first()?;
        let runner_up = candidates
            .get(1)
            .map(|candidate| (candidate.model.as_str(), candidate.score));

        let ambiguity = self
            .ambiguity
            .evaluate(query, (top.model.as_str(), top.score), runner_up);
        if ambiguity.close_call {
            self.summary.close_calls += 1;
        }

        let result = ResolutionResult::new(brand, &top.model, kind);
        Some(if ambiguity.gap.is_finite() {
            result.with_gap(ambiguity.gap)
        } else {
            result
        })
    }

    fn fuzzy_stage(&mut self, brand: &str, model: &str) -> Option<ResolutionResult> {
        self.fuzzy_pick(brand, model, ResolutionKind::Fuzzy)
    }

    fn partial_stage(&mut self, brand: &str, model: &str) -> Option<ResolutionResult> {
        for suffix in token_suffixes(model, self.partial_min_tail) {
            if let Some(result) = self.fuzzy_pick(brand, &suffix, ResolutionKind::Partial) {
                debug!("Partial match on '{}' for '{}'", suffix, model);
                return Some(result);
            }
        }
        None
    }

    /// Cross-brand search. The candidate's owning brand replaces the vendor's.
    fn wide_stage(&mut self, model: &str) -> Option<ResolutionResult> {
        let queries = std::iter::once(model.to_string()).chain(token_suffixes(model, self.partial_min_tail));
        for query in queries {
            self.index_queries += 1;
            let candidates = self.index.global_fuzzy_search(&query);
            let Some(top) = candidates.first() else {
                continue;
            };
            let runner_up = candidates
                .get(1)
                .map(|candidate| (candidate.model.as_str(), candidate.score));
            let ambiguity = self
                .ambiguity
                .evaluate(&query, (top.model.as_str(), top.score), runner_up);
            if ambiguity.close_call {
                self.summary.close_calls += 1;
            }

            info!("Wide match for '{}': {} / {}", model, top.brand, top.model);
            let result = ResolutionResult::new(&top.brand, &top.model, ResolutionKind::Wide);
            return Some(if ambiguity.gap.is_finite() {
                result.with_gap(ambiguity.gap)
            } else {
                result
            });
        }
        None
    }

    async fn ai_stage(&mut self, brand: &str, model: &str) -> Option<ResolutionResult> {
        let ai = self.ai.as_mut()?;
        match ai.resolve(&self.index, brand, model).await {
            AiVerdict::Verified { model } => Some(ResolutionResult::new(brand, model, ResolutionKind::Ai)),
            verdict => {
                debug!("AI fallback gave nothing for '{}': {:?}", model, verdict);
                None
            }
        }
    }
}
