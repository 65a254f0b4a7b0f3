use crate::model::ResolutionKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Per-kind outcome counts for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    counts: BTreeMap<ResolutionKind, usize>,
    pub close_calls: usize,
    pub ai_calls: usize,
}

impl RunSummary {
    pub fn record(&mut self, kind: ResolutionKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }

    pub fn count(&self, kind: ResolutionKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn resolved(&self) -> usize {
        self.total() - self.count(ResolutionKind::Fail)
    }

    /// Share of resolved items, 0.0 for an empty run.
    pub fn coverage(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.resolved() as f64 / total as f64,
        }
    }

    pub fn log(&self) {
        info!(
            "Run summary: {} items, {:.1}% resolved | {} | close calls: {}, AI calls: {}",
            self.total(),
            self.coverage() * 100.0,
            self,
            self.close_calls,
            self.ai_calls
        );
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = ResolutionKind::ALL
            .iter()
            .map(|kind| format!("{}={}", kind, self.count(*kind)))
            .collect();
        f.write_str(&parts.join(" "))
    }
}
