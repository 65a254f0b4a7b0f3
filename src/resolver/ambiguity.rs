use tracing::warn;

/// Confidence of a fuzzy decision: how far the chosen candidate is ahead of the next one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ambiguity {
    /// Infinite when there was no runner-up.
    pub gap: f64,
    pub close_call: bool,
}

pub struct AmbiguityEvaluator {
    threshold: f64,
}

impl AmbiguityEvaluator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Never changes the pick; a close call is only logged for catalog curation.
    pub fn evaluate(&self, query: &str, top: (&str, f64), runner_up: Option<(&str, f64)>) -> Ambiguity {
        let Some((second_name, second_score)) = runner_up else {
            return Ambiguity {
                gap: f64::INFINITY,
                close_call: false,
            };
        };

        let gap = top.1 - second_score;
        let close_call = gap < self.threshold;
        if close_call {
            warn!(
                "Close call for '{}': '{}' ({:.3}) vs '{}' ({:.3}), gap {:.3}",
                query, top.0, top.1, second_name, second_score, gap
            );
        }
        Ambiguity { gap, close_call }
    }
}
