use crate::model::CatalogError;
use serde::Deserialize;
use std::fs;

/// Reference catalog exactly as stored on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCatalog {
    #[serde(default)]
    pub brands: Vec<String>,
    pub models: Vec<RawBrandModels>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBrandModels {
    pub brand: String,
    pub models: Vec<String>,
}

pub fn parse_catalog(content: &str) -> Result<RawCatalog, CatalogError> {
    Ok(serde_json::from_str(content)?)
}

pub fn load_catalog(path: &str) -> Result<RawCatalog, CatalogError> {
    let content = fs::read_to_string(path)?;
    parse_catalog(&content)
}
