// Resolver module: substitution, caching, the match cascade and its diagnostics.

pub mod ambiguity;
pub mod cache;
pub mod cascade;
pub mod substitution;
pub mod summary;

pub use substitution::SubstitutionEngine;
pub use summary::RunSummary;

use crate::ai::{AiBackend, AiFallback};
use crate::catalog::{BrandMatch, CatalogIndex};
use crate::config::AppConfig;
use crate::model::ResolutionResult;
use ambiguity::AmbiguityEvaluator;
use cache::ResolutionCache;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves vendor `(brand, model)` pairs against the catalog.
///
/// Built once per run and dropped afterwards; the cache, brand memo and AI failure
/// counter live only as long as the run. Items are resolved one at a time through
/// `&mut self`.
pub struct Resolver {
    index: Arc<CatalogIndex>,
    rules: Arc<SubstitutionEngine>,
    cache: ResolutionCache,
    brands: HashMap<String, BrandMatch>,
    ambiguity: AmbiguityEvaluator,
    ai: Option<AiFallback>,
    use_cache: bool,
    partial_search: bool,
    wide_search: bool,
    partial_min_tail: usize,
    summary: RunSummary,
    index_queries: usize,
}

impl Resolver {
    pub fn new(
        index: Arc<CatalogIndex>,
        rules: Arc<SubstitutionEngine>,
        ai_backend: Option<Arc<dyn AiBackend>>,
        config: &AppConfig,
    ) -> Self {
        let ai = ai_backend
            .filter(|_| config.ai.enabled)
            .map(|backend| AiFallback::new(backend, &config.ai));

        Self {
            index,
            rules,
            cache: ResolutionCache::new(),
            brands: HashMap::new(),
            ambiguity: AmbiguityEvaluator::new(config.matching.ambiguity_gap_threshold),
            ai,
            use_cache: config.resolver.use_cache,
            partial_search: config.resolver.partial_search,
            wide_search: config.resolver.wide_search,
            partial_min_tail: config.matching.partial_min_tail.max(1),
            summary: RunSummary::default(),
            index_queries: 0,
        }
    }

    /// Resolves one item. Never fails: a miss comes back as `ResolutionKind::Fail`
    /// carrying the post-substitution brand and model.
    pub async fn resolve(&mut self, brand: &str, model: &str) -> ResolutionResult {
        let substitution = self.rules.apply(brand, model);

        if self.use_cache {
            if let Some(hit) = self.cache.get(&substitution.brand, &substitution.model) {
                debug!("Cache hit: {} / {} -> {}", substitution.brand, substitution.model, hit.model);
                self.summary.record(hit.kind);
                return hit;
            }
        }

        let result = self.run_cascade(&substitution).await;

        if self.use_cache {
            self.cache
                .put(&substitution.brand, &substitution.model, result.clone());
        }
        self.summary.record(result.kind);
        result
    }

    /// Maps the working brand onto the catalog, memoized per run.
    fn resolve_brand(&mut self, brand: &str) -> BrandMatch {
        if let Some(found) = self.brands.get(brand) {
            return found.clone();
        }
        self.index_queries += 1;
        let found = self.index.resolve_brand(brand);
        if found.known && found.name != brand {
            debug!("Brand '{}' resolved to '{}'", brand, found.name);
        }
        self.brands.insert(brand.to_string(), found.clone());
        found
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = self.summary.clone();
        summary.ai_calls = self.ai.as_ref().map_or(0, AiFallback::calls);
        summary
    }

    /// Index lookups issued so far, cache hits excluded.
    pub fn index_queries(&self) -> usize {
        self.index_queries
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::loader::parse_catalog;
    use crate::config::MatchingConfig;
    use crate::model::{AiError, ResolutionKind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        answer: Mutex<String>,
        calls: AtomicUsize,
    }

    impl CountingBackend {
        fn answering(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Mutex::new(answer.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl AiBackend for CountingBackend {
        async fn complete(&self, _query: &str, _candidates: &[String]) -> Result<String, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.lock().unwrap().clone())
        }
    }

    fn catalog() -> Arc<CatalogIndex> {
        let raw = parse_catalog(
            r#"{
                "brands": ["Nokian", "Pirelli", "KAMA"],
                "models": [
                    { "brand": "Nokian", "models": ["Hakkapeliitta 9", "Hakkapeliitta R3", "Nordman 8"] },
                    { "brand": "Pirelli", "models": ["Ice Zero", "Scorpion Verde"] },
                    { "brand": "KAMA", "models": ["Кама Grant (HK-241)"] }
                ]
            }"#,
        )
        .unwrap();
        Arc::new(CatalogIndex::build(raw, &MatchingConfig::default()).unwrap())
    }

    fn rules() -> Arc<SubstitutionEngine> {
        Arc::new(
            SubstitutionEngine::parse(
                r#"{
                    "makes": { "nokian tyres": "Nokian", "tigar": "Tigar" },
                    "models": { "hk-241": { "make": "KAMA", "model": "Кама Grant (HK-241)" } },
                    "buzzwords": ["XL"]
                }"#,
            )
            .unwrap(),
        )
    }

    fn ai_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.ai.enabled = true;
        config
    }

    fn resolver() -> Resolver {
        Resolver::new(catalog(), rules(), None, &AppConfig::default())
    }

    #[tokio::test]
    async fn exact_match_ignores_case() {
        let result = resolver().resolve("Nokian", "hakkapeliitta 9").await;
        assert_eq!(result.kind, ResolutionKind::Exact);
        assert_eq!(result.brand, "Nokian");
        assert_eq!(result.model, "Hakkapeliitta 9");
    }

    #[tokio::test]
    async fn brand_rule_sets_resolved_brand() {
        let result = resolver().resolve("Nokian Tyres", "Nordman 8 XL").await;
        assert_eq!(result.kind, ResolutionKind::Exact);
        assert_eq!(result.brand, "Nokian");
        assert_eq!(result.model, "Nordman 8");
    }

    #[tokio::test]
    async fn pinned_brand_is_never_replaced_by_wide_search() {
        let result = resolver().resolve("Tigar", "Ice Zero").await;
        assert_eq!(result.kind, ResolutionKind::Fail);
        assert_eq!(result.brand, "Tigar");
        assert_eq!(result.model, "Ice Zero");
    }

    #[tokio::test]
    async fn model_rule_resolves_as_substitution() {
        let result = resolver().resolve("Kama", "Grant HK-241").await;
        assert_eq!(result.kind, ResolutionKind::Substitution);
        assert_eq!(result.brand, "KAMA");
        assert_eq!(result.model, "Кама Grant (HK-241)");
    }

    #[tokio::test]
    async fn missing_space_resolves_through_fuzzy_stage() {
        let result = resolver().resolve("Nokian", "hakkapeliitta9").await;
        assert_eq!(result.kind, ResolutionKind::Fuzzy);
        assert_eq!(result.model, "Hakkapeliitta 9");
    }

    #[tokio::test]
    async fn leading_noise_resolves_through_partial_stage() {
        let result = resolver().resolve("Nokian", "New Hakkapeliitta 9").await;
        assert_eq!(result.kind, ResolutionKind::Partial);
        assert_eq!(result.brand, "Nokian");
        assert_eq!(result.model, "Hakkapeliitta 9");
    }

    #[tokio::test]
    async fn wide_stage_takes_the_owning_brand() {
        let mut resolver = resolver();

        let result = resolver.resolve("Nokian", "Scorpion Verde").await;
        assert_eq!(result.kind, ResolutionKind::Wide);
        assert_eq!(result.brand, "Pirelli");
        assert_eq!(result.model, "Scorpion Verde");

        let result = resolver.resolve("Acme", "Ice Zero").await;
        assert_eq!(result.kind, ResolutionKind::Wide);
        assert_eq!(result.brand, "Pirelli");
    }

    #[tokio::test]
    async fn wide_stage_drops_leading_tokens() {
        let result = resolver().resolve("Acme", "Super Ice Zero").await;
        assert_eq!(result.kind, ResolutionKind::Wide);
        assert_eq!(result.brand, "Pirelli");
        assert_eq!(result.model, "Ice Zero");
    }

    fn small_catalog(brand: &str, models: &[&str]) -> Arc<CatalogIndex> {
        let raw = parse_catalog(
            &serde_json::json!({ "models": [{ "brand": brand, "models": models }] }).to_string(),
        )
        .unwrap();
        Arc::new(CatalogIndex::build(raw, &MatchingConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn near_tie_counts_a_close_call_and_keeps_the_top_pick() {
        let index = small_catalog("Tigar", &["Winter 1", "Winter 2"]);
        let mut resolver = Resolver::new(index, rules(), None, &AppConfig::default());

        let result = resolver.resolve("Tigar", "Winter").await;
        assert_eq!(result.kind, ResolutionKind::Fuzzy);
        assert_eq!(result.model, "Winter 1");
        assert_eq!(result.gap, Some(0.0));
        assert_eq!(resolver.summary().close_calls, 1);
    }

    #[tokio::test]
    async fn buzzword_does_not_eat_model_words() {
        let index = small_catalog("Gislaved", &["Nord Frost 200", "Soft Frost 200"]);
        let rules = Arc::new(SubstitutionEngine::parse(r#"{ "buzzwords": ["FR"] }"#).unwrap());
        let mut resolver = Resolver::new(index, rules, None, &AppConfig::default());

        let result = resolver.resolve("Gislaved", "Nord Frost 200 FR").await;
        assert_eq!(result.kind, ResolutionKind::Exact);
        assert_eq!(result.model, "Nord Frost 200");
    }

    #[tokio::test]
    async fn repeated_input_is_served_from_cache() {
        let mut resolver = resolver();

        let first = resolver.resolve("Nokian", "hakkapeliitta9").await;
        let queries = resolver.index_queries();
        let second = resolver.resolve("Nokian", "hakkapeliitta9").await;

        assert_eq!(second.kind, ResolutionKind::Cache);
        assert_eq!(second.brand, first.brand);
        assert_eq!(second.model, first.model);
        assert_eq!(second.gap, first.gap);
        assert_eq!(resolver.index_queries(), queries);
        assert_eq!(resolver.cached_entries(), 1);
    }

    #[tokio::test]
    async fn cache_key_is_post_substitution() {
        let mut resolver = resolver();
        resolver.resolve("Nokian", "Nordman 8 XL").await;
        let hit = resolver.resolve("Nokian", "Nordman 8").await;
        assert_eq!(hit.kind, ResolutionKind::Cache);
    }

    #[tokio::test]
    async fn verified_ai_answer_resolves() {
        let backend = CountingBackend::answering(r#"{"matched_tire": "nordman 8"}"#);
        let mut resolver = Resolver::new(catalog(), rules(), Some(backend.clone()), &ai_config());

        let result = resolver.resolve("Nokian", "Mystery Tread").await;
        assert_eq!(result.kind, ResolutionKind::Ai);
        assert_eq!(result.brand, "Nokian");
        assert_eq!(result.model, "Nordman 8");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn hallucinated_ai_answer_fails() {
        let backend = CountingBackend::answering(r#"{"matched_tire": "Hakkapeliitta 99"}"#);
        let mut resolver = Resolver::new(catalog(), rules(), Some(backend.clone()), &ai_config());

        let result = resolver.resolve("Nokian", "Mystery Tread").await;
        assert_eq!(result.kind, ResolutionKind::Fail);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn unmatchable_model_fails_with_working_values() {
        let backend = CountingBackend::answering(r#"{"matched_tire": null}"#);
        let mut resolver = Resolver::new(catalog(), rules(), Some(backend.clone()), &ai_config());

        let first = resolver.resolve("Nokian Tyres", "Zzqx Qwv XL").await;
        assert_eq!(first, ResolutionResult::failed("Nokian", "Zzqx Qwv"));

        let second = resolver.resolve("Nokian Tyres", "Zzqx Qwv XL").await;
        assert_eq!(second, first);
        assert_eq!(backend.calls(), 1);
        assert_eq!(resolver.summary().ai_calls, 1);
    }

    #[tokio::test]
    async fn disabled_ai_is_never_called() {
        let backend = CountingBackend::answering(r#"{"matched_tire": "Nordman 8"}"#);
        let mut resolver = Resolver::new(catalog(), rules(), Some(backend.clone()), &AppConfig::default());

        let result = resolver.resolve("Nokian", "Mystery Tread").await;
        assert_eq!(result.kind, ResolutionKind::Fail);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn summary_counts_outcomes() {
        let mut resolver = resolver();
        resolver.resolve("Nokian", "Nordman 8").await;
        resolver.resolve("Nokian", "Nordman 8").await;
        resolver.resolve("Nokian", "hakkapeliitta9").await;
        resolver.resolve("Nokian", "Zzqx").await;

        let summary = resolver.summary();
        assert_eq!(summary.count(ResolutionKind::Exact), 1);
        assert_eq!(summary.count(ResolutionKind::Cache), 1);
        assert_eq!(summary.count(ResolutionKind::Fuzzy), 1);
        assert_eq!(summary.count(ResolutionKind::Fail), 1);
        assert_eq!(summary.total(), 4);
    }
}
