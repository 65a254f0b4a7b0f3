// Catalog module: reference brands/models and the indexes built over them.

pub mod index;
pub mod loader;

pub use index::{BrandMatch, CatalogIndex};

/// A canonical model and the brand that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogModel {
    pub brand: String,
    pub name: String,
}

impl CatalogModel {
    pub fn new(brand: &str, name: &str) -> Self {
        Self {
            brand: brand.to_string(),
            name: name.to_string(),
        }
    }
}
