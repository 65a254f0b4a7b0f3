// Listing module: turns resolved feed items into marketplace records.
use crate::model::{FeedItem, Listing, ListingError, ResolutionResult};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

static RE_CF_SERIES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"CF-(\d+)").expect("Invalid regex"));

const STUDDED: &str = "Шипованная";
const STUDLESS: &str = "Нешипованная";

/// Marketplace tyre type from the vendor's season and studding fields.
pub fn tyre_type(season: &str, thorn: &str) -> String {
    match (thorn, season) {
        (STUDDED, _) => "Зимние шипованные".to_string(),
        (STUDLESS, _) => "Зимние нешипованные".to_string(),
        (_, "Всесезонная") => "Всесезонные".to_string(),
        (_, "Летняя") => "Летние".to_string(),
        (_, other) => other.to_string(),
    }
}

/// Digits of the rim diameter only: `"R16C"` becomes `"16"`.
pub fn rim_diameter(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Marketplace spelling of the `CF-NN` series.
pub fn marketplace_model(model: &str) -> String {
    RE_CF_SERIES.replacen(model, 1, "CF$1").into_owned()
}

pub struct ListingBuilder {
    image_base_url: Option<String>,
    skipped: usize,
}

impl ListingBuilder {
    pub fn new(image_base_url: Option<&str>) -> Self {
        Self {
            image_base_url: image_base_url.map(|url| url.trim_end_matches('/').to_string()),
            skipped: 0,
        }
    }

    /// Failed resolutions produce no listing and are counted as skipped.
    pub fn build(&mut self, item: &FeedItem, resolution: &ResolutionResult) -> Option<Listing> {
        if !resolution.is_usable() {
            debug!("Skipping {}: {} / {} unresolved", item.product_id, item.brand, item.model);
            self.skipped += 1;
            return None;
        }

        Some(Listing {
            id: item.product_id.clone(),
            brand: resolution.brand.clone(),
            model: marketplace_model(&resolution.model),
            size: item.size.clone(),
            tire_section_width: item.width.clone(),
            tire_aspect_ratio: item.height.clone(),
            rim_diameter: rim_diameter(&item.diameter),
            tire_type: tyre_type(&item.season, &item.thorn),
            artikul: item.artikul.clone(),
            image_url: self
                .image_base_url
                .as_ref()
                .map(|base| format!("{}/{}.jpeg", base, item.product_id)),
            resolution: resolution.kind,
        })
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Writes the listings as pretty JSON, creating the parent folder if needed.
pub fn write_listings(path: &str, listings: &[Listing]) -> Result<(), ListingError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(listings)?;
    fs::write(path, json)?;
    info!("Wrote {} listings to {}", listings.len(), path);
    Ok(())
}
