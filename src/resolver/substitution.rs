//! Hand-curated overrides applied before any fuzzy matching.

use crate::model::RulesError;
use regex::Regex;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelOverride {
    #[serde(default, alias = "brand")]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Rules file contents. Both maps keep their declaration order, which decides
/// which rule wins when several triggers match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubstitutionRules {
    #[serde(default, alias = "brands", deserialize_with = "ordered_pairs")]
    pub makes: Vec<(String, String)>,
    #[serde(default, deserialize_with = "ordered_pairs")]
    pub models: Vec<(String, ModelOverride)>,
    #[serde(default)]
    pub buzzwords: Vec<String>,
}

fn ordered_pairs<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct PairsVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of trigger substrings")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairsVisitor(PhantomData))
}

/// Case-sensitive literal match. Ends that are word characters must sit on a word
/// boundary, so `FR` strips `... FR` but leaves `Frost` and `FRX` alone.
fn buzzword_pattern(word: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let mut pattern = regex::escape(word);
    if is_word(word.chars().next()) {
        pattern.insert_str(0, r"\b");
    }
    if is_word(word.chars().last()) {
        pattern.push_str(r"\b");
    }
    pattern
}

/// Working values after substitution, plus which overrides fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub brand: String,
    pub model: String,
    /// A rule named the brand, so no later stage may replace it.
    pub brand_pinned: bool,
    pub model_overridden: bool,
}

pub struct SubstitutionEngine {
    makes: Vec<(String, String)>,
    models: Vec<(String, ModelOverride)>,
    buzzwords: Vec<Regex>,
}

impl SubstitutionEngine {
    pub fn new(rules: SubstitutionRules) -> Self {
        let makes = rules
            .makes
            .into_iter()
            .filter(|(trigger, _)| !trigger.trim().is_empty())
            .map(|(trigger, brand)| (trigger.to_lowercase(), brand))
            .collect();
        let models = rules
            .models
            .into_iter()
            .filter(|(trigger, _)| !trigger.trim().is_empty())
            .map(|(trigger, rule)| (trigger.to_lowercase(), rule))
            .collect();
        let buzzwords = rules
            .buzzwords
            .iter()
            .filter(|word| !word.trim().is_empty())
            .filter_map(|word| Regex::new(&buzzword_pattern(word)).ok())
            .collect();

        Self {
            makes,
            models,
            buzzwords,
        }
    }

    pub fn empty() -> Self {
        Self::new(SubstitutionRules::default())
    }

    pub fn parse(content: &str) -> Result<Self, RulesError> {
        let rules: SubstitutionRules = serde_json::from_str(content)?;
        Ok(Self::new(rules))
    }

    pub fn load(path: &str) -> Result<Self, RulesError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Rules are optional: a missing or malformed file leaves resolution without overrides.
    pub fn load_or_empty(path: &str) -> Self {
        match Self::load(path) {
            Ok(engine) => {
                info!(
                    "Substitution rules loaded: {} brand, {} model, {} buzzwords",
                    engine.makes.len(),
                    engine.models.len(),
                    engine.buzzwords.len()
                );
                engine
            }
            Err(e) => {
                warn!("{}; continuing without substitution rules", e);
                Self::empty()
            }
        }
    }

    pub fn strip_buzzwords(&self, model: &str) -> String {
        let mut cleaned = model.to_string();
        for buzzword in &self.buzzwords {
            cleaned = buzzword.replace_all(&cleaned, " ").into_owned();
        }
        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn apply(&self, brand: &str, model: &str) -> Substitution {
        let mut result = Substitution {
            brand: brand.trim().to_string(),
            model: self.strip_buzzwords(model),
            brand_pinned: false,
            model_overridden: false,
        };

        let brand_lower = brand.to_lowercase();
        if let Some((_, canonical)) = self
            .makes
            .iter()
            .find(|(trigger, _)| brand_lower.contains(trigger.as_str()))
        {
            result.brand = canonical.clone();
            result.brand_pinned = true;
        }

        let model_lower = result.model.to_lowercase();
        if let Some((_, rule)) = self
            .models
            .iter()
            .find(|(trigger, _)| model_lower.contains(trigger.as_str()))
        {
            if let Some(make) = &rule.make {
                result.brand = make.clone();
                result.brand_pinned = true;
            }
            if let Some(model) = &rule.model {
                result.model = model.clone();
                result.model_overridden = true;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SubstitutionEngine {
        SubstitutionEngine::parse(
            r#"{
                "makes": { "nokian tyres": "Nokian", "кама": "KAMA", "nokian": "Nokian Old" },
                "models": {
                    "hk-241": { "make": "KAMA", "model": "Кама Grant (HK-241)" },
                    "hp": { "model": "High Performance" },
                    "ice zero": { "brand": "Pirelli" }
                },
                "buzzwords": ["XL", "(Новинка)"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn buzzwords_are_stripped_as_whole_words() {
        let engine = engine();
        assert_eq!(engine.strip_buzzwords("Nordman 8 XL (Новинка)"), "Nordman 8");
        assert_eq!(engine.strip_buzzwords("Nordman 8 xl"), "Nordman 8 xl");
        assert_eq!(engine.strip_buzzwords("XLXL Hakka XL"), "XLXL Hakka");
    }

    #[test]
    fn buzzword_inside_a_word_is_kept() {
        let engine = SubstitutionEngine::parse(r#"{ "buzzwords": ["FR"] }"#).unwrap();
        assert_eq!(engine.apply("Gislaved", "Nord Frost 200 FR").model, "Nord Frost 200");
        assert_eq!(engine.strip_buzzwords("FR Nord Frost FRX"), "Nord Frost FRX");
    }

    #[test]
    fn first_declared_brand_rule_wins() {
        let result = engine().apply("Nokian Tyres PLC", "Nordman 8");
        assert_eq!(result.brand, "Nokian");
        assert!(result.brand_pinned);
        assert!(!result.model_overridden);
        assert_eq!(result.model, "Nordman 8");
    }

    #[test]
    fn model_rule_replaces_brand_and_model() {
        let result = engine().apply("Kama Tyres", "Grant HK-241 XL");
        assert_eq!(result.brand, "KAMA");
        assert_eq!(result.model, "Кама Grant (HK-241)");
        assert!(result.brand_pinned && result.model_overridden);
    }

    #[test]
    fn partial_override_passes_other_field_through() {
        let result = engine().apply("Tigar", "HP");
        assert_eq!(result.brand, "Tigar");
        assert!(!result.brand_pinned);
        assert_eq!(result.model, "High Performance");

        let result = engine().apply("Pirel", "Ice Zero FR");
        assert_eq!(result.brand, "Pirelli");
        assert_eq!(result.model, "Ice Zero FR");
        assert!(!result.model_overridden);
    }

    #[test]
    fn rule_order_follows_the_file() {
        let rules: SubstitutionRules =
            serde_json::from_str(r#"{ "makes": { "b": "2", "a": "1", "c": "3" } }"#).unwrap();
        let triggers: Vec<&str> = rules.makes.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(triggers, vec!["b", "a", "c"]);
    }

    #[test]
    fn malformed_rules_degrade_to_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"{ \"makes\": [1, 2] }").unwrap();
        let engine = SubstitutionEngine::load_or_empty(file.path().to_str().unwrap());
        let result = engine.apply("Nokian", "Nordman 8");
        assert_eq!(result.brand, "Nokian");
        assert!(!result.brand_pinned);
    }

    #[test]
    fn missing_rules_file_degrades_to_empty() {
        let engine = SubstitutionEngine::load_or_empty("/nonexistent/substitutes.json");
        assert_eq!(engine.apply(" Nokian ", "Nordman  8").model, "Nordman 8");
    }
}
