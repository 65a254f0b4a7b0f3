use crate::model::{ResolutionKind, ResolutionResult};
use std::collections::HashMap;

/// Run-scoped memo of `(brand, model) → result`, keyed on post-substitution values.
/// Entries are overwritten per key and never evicted.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: HashMap<(String, String), ResolutionResult>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A successful entry comes back tagged `Cache`; a failed one stays `Fail`
    /// so callers keep skipping it.
    pub fn get(&self, brand: &str, model: &str) -> Option<ResolutionResult> {
        let stored = self.entries.get(&(brand.to_string(), model.to_string()))?;
        let mut hit = stored.clone();
        if hit.is_usable() {
            hit.kind = ResolutionKind::Cache;
        }
        Some(hit)
    }

    pub fn put(&mut self, brand: &str, model: &str, result: ResolutionResult) {
        self.entries
            .insert((brand.to_string(), model.to_string()), result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
