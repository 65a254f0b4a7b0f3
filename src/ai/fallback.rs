use super::{AiBackend, parse_answer};
use crate::catalog::CatalogIndex;
use crate::config::AiConfig;
use crate::matcher::normalize::fold;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// What came of one AI fallback attempt. Only `Verified` names exist in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiVerdict {
    /// The answer was in the shortlist and the brand index found it again.
    Verified { model: String },
    /// The model answered with a name that failed verification.
    Discarded { suggested: String },
    /// Null answer, or one that failed schema validation.
    NoMatch,
    /// The query already used up its retry budget; no call was made.
    Suppressed,
    /// Transport error or timeout.
    Failed(String),
}

/// Owns the AI backend and the per-query failure counter for one run.
pub struct AiFallback {
    backend: Arc<dyn AiBackend>,
    failures: HashMap<String, u32>,
    retry_budget: u32,
    min_shortlist: usize,
    timeout: Duration,
    calls: usize,
}

impl AiFallback {
    pub fn new(backend: Arc<dyn AiBackend>, config: &AiConfig) -> Self {
        Self {
            backend,
            failures: HashMap::new(),
            retry_budget: config.retry_budget,
            min_shortlist: config.min_shortlist,
            timeout: Duration::from_secs(config.timeout_seconds),
            calls: 0,
        }
    }

    /// Requests actually sent to the backend.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Brand models sharing a lowercase word with the query. Falls back to the whole
    /// store when that leaves `min_shortlist` names or fewer.
    pub fn shortlist(&self, query: &str, store: &[String]) -> Vec<String> {
        let query_words: HashSet<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let restricted: Vec<String> = store
            .iter()
            .filter(|name| {
                name.to_lowercase()
                    .split_whitespace()
                    .any(|word| query_words.contains(word))
            })
            .cloned()
            .collect();

        if restricted.len() > self.min_shortlist {
            restricted
        } else {
            store.to_vec()
        }
    }

    pub async fn resolve(&mut self, index: &CatalogIndex, brand: &str, query: &str) -> AiVerdict {
        let key = query.trim().to_lowercase();
        if self.failures.get(&key).copied().unwrap_or(0) >= self.retry_budget {
            debug!("AI skipped for '{}': retry budget spent", key);
            return AiVerdict::Suppressed;
        }

        let store = index.models_of(brand);
        if store.is_empty() {
            return AiVerdict::NoMatch;
        }
        let shortlist = self.shortlist(query, store);

        self.calls += 1;
        let verdict = match timeout(self.timeout, self.backend.complete(&key, &shortlist)).await {
            Err(_) => {
                warn!("AI request for '{}' timed out after {:?}", key, self.timeout);
                AiVerdict::Failed("timed out".into())
            }
            Ok(Err(e)) => {
                warn!("AI request for '{}' failed: {}", key, e);
                AiVerdict::Failed(e.to_string())
            }
            Ok(Ok(body)) => match parse_answer(&body) {
                Ok(Some(suggested)) => Self::verify(index, brand, &shortlist, suggested),
                Ok(None) => AiVerdict::NoMatch,
                Err(e) => {
                    warn!("Discarding AI answer for '{}': {}", key, e);
                    AiVerdict::NoMatch
                }
            },
        };

        match &verdict {
            AiVerdict::Verified { model } => info!("AI matched '{}' to '{}' ({})", query, model, brand),
            _ => *self.failures.entry(key).or_insert(0) += 1,
        }
        verdict
    }

    /// Hallucination guard: the answer must be one of the names we offered and the
    /// brand's own index must find it again.
    fn verify(index: &CatalogIndex, brand: &str, shortlist: &[String], suggested: String) -> AiVerdict {
        let folded = fold(&suggested);
        let Some(listed) = shortlist.iter().find(|candidate| fold(candidate) == folded) else {
            warn!("AI suggested '{}' which was not offered; discarded", suggested);
            return AiVerdict::Discarded { suggested };
        };

        if index.fuzzy_search(brand, listed).is_empty() {
            warn!("AI suggestion '{}' not found in the {} index; discarded", listed, brand);
            return AiVerdict::Discarded { suggested };
        }

        match index.exact_lookup(brand, listed) {
            Some(model) => AiVerdict::Verified {
                model: model.to_string(),
            },
            None => AiVerdict::Discarded { suggested },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::loader::parse_catalog;
    use crate::config::MatchingConfig;
    use crate::model::AiError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        answers: Mutex<Vec<Result<String, AiError>>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedBackend {
        fn new(answers: Vec<Result<String, AiError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl AiBackend for ScriptedBackend {
        async fn complete(&self, _query: &str, candidates: &[String]) -> Result<String, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(candidates.to_vec());
            let mut answers = self.answers.lock().unwrap();
            if answers.is_empty() {
                Ok(r#"{"matched_tire": null}"#.to_string())
            } else {
                answers.remove(0)
            }
        }
    }

    struct StalledBackend;

    #[async_trait::async_trait]
    impl AiBackend for StalledBackend {
        async fn complete(&self, _query: &str, _candidates: &[String]) -> Result<String, AiError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(r#"{"matched_tire": null}"#.to_string())
        }
    }

    fn index() -> CatalogIndex {
        let raw = parse_catalog(
            r#"{ "models": [{ "brand": "Nokian", "models": [
                "Hakkapeliitta 9", "Hakkapeliitta 10", "Hakkapeliitta R3", "Hakkapeliitta R5",
                "Hakkapeliitta 8", "Hakkapeliitta 7", "Nordman 8"
            ] }] }"#,
        )
        .unwrap();
        CatalogIndex::build(raw, &MatchingConfig::default()).unwrap()
    }

    fn config() -> AiConfig {
        AiConfig {
            enabled: true,
            ..AiConfig::default()
        }
    }

    #[tokio::test]
    async fn verified_answer_returns_canonical_name() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{"matched_tire": "nordman 8"}"#.into())]);
        let mut fallback = AiFallback::new(backend.clone(), &config());

        let verdict = fallback.resolve(&index(), "Nokian", "nordmann eight").await;
        assert_eq!(verdict, AiVerdict::Verified { model: "Nordman 8".into() });
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn answer_outside_shortlist_is_discarded() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{"matched_tire": "Hakkapeliitta 99"}"#.into())]);
        let mut fallback = AiFallback::new(backend, &config());

        let verdict = fallback.resolve(&index(), "Nokian", "hakka 99").await;
        assert_eq!(
            verdict,
            AiVerdict::Discarded {
                suggested: "Hakkapeliitta 99".into()
            }
        );
    }

    #[tokio::test]
    async fn schema_violation_counts_as_no_match() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{"answer": "Nordman 8"}"#.into())]);
        let mut fallback = AiFallback::new(backend, &config());
        assert_eq!(fallback.resolve(&index(), "Nokian", "x").await, AiVerdict::NoMatch);
    }

    #[tokio::test]
    async fn repeated_failures_suppress_further_calls() {
        let backend = ScriptedBackend::new(vec![
            Err(AiError::Status(500)),
            Ok(r#"{"matched_tire": null}"#.into()),
        ]);
        let mut fallback = AiFallback::new(backend.clone(), &config());
        let index = index();

        assert!(matches!(
            fallback.resolve(&index, "Nokian", "Mystery").await,
            AiVerdict::Failed(_)
        ));
        assert_eq!(fallback.resolve(&index, "Nokian", "mystery ").await, AiVerdict::NoMatch);
        assert_eq!(fallback.resolve(&index, "Nokian", "MYSTERY").await, AiVerdict::Suppressed);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fallback.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_times_out() {
        let mut fallback = AiFallback::new(Arc::new(StalledBackend), &config());
        assert_eq!(
            fallback.resolve(&index(), "Nokian", "anything").await,
            AiVerdict::Failed("timed out".into())
        );
    }

    #[tokio::test]
    async fn unknown_brand_is_not_sent() {
        let backend = ScriptedBackend::new(vec![]);
        let mut fallback = AiFallback::new(backend.clone(), &config());
        assert_eq!(fallback.resolve(&index(), "Pirelli", "Ice Zero").await, AiVerdict::NoMatch);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn shortlist_prefers_shared_words() {
        let fallback = AiFallback::new(ScriptedBackend::new(vec![]), &config());
        let index = index();
        let store = index.models_of("Nokian");

        let restricted = fallback.shortlist("Hakkapeliitta XL", store);
        assert_eq!(restricted.len(), 6);
        assert!(!restricted.contains(&"Nordman 8".to_string()));

        let full = fallback.shortlist("Nordman XL", store);
        assert_eq!(full.len(), store.len());
    }
}
