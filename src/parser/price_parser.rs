// Vendor XML price list parsing
use crate::model::{FeedItem, ParserError};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

// html5ever does not honour `<tag/>` outside of SVG, so empty fields are expanded first.
static SELF_CLOSING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z_][\w\-]*)\s*/>").expect("Invalid regex"));

pub trait FeedParser {
    fn parse(&self, content: &str) -> Result<Vec<FeedItem>, ParserError>;
}

pub struct PriceListParser {
    record: Selector,
    fields: [(&'static str, Selector); 10],
}

impl PriceListParser {
    pub fn new() -> Result<Self, ParserError> {
        let selector = |name: &str| Selector::parse(name).map_err(|e| ParserError::Selector(e.to_string()));
        Ok(Self {
            record: selector("tyre")?,
            fields: [
                ("product_id", selector("product_id")?),
                ("brand", selector("brand")?),
                ("model", selector("model")?),
                ("size", selector("size")?),
                ("width", selector("width")?),
                ("height", selector("height")?),
                ("diameter", selector("diameter")?),
                ("season", selector("season")?),
                ("thorn", selector("thorn")?),
                ("artikul", selector("artikul")?),
            ],
        })
    }

    fn field(&self, record: &ElementRef, selector: &Selector) -> String {
        record
            .select(selector)
            .next()
            .map(|node| node.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    fn read_record(&self, record: &ElementRef) -> FeedItem {
        let mut item = FeedItem::default();
        for (name, selector) in &self.fields {
            let value = self.field(record, selector);
            match *name {
                "product_id" => item.product_id = value,
                "brand" => item.brand = value,
                "model" => item.model = value,
                "size" => item.size = value,
                "width" => item.width = value,
                "height" => item.height = value,
                "diameter" => item.diameter = value,
                "season" => item.season = value,
                "thorn" => item.thorn = value,
                _ => item.artikul = value,
            }
        }
        item
    }

    /// Parses every listed file under `dir`, dropping products already seen in an
    /// earlier file. Unreadable files are logged and skipped.
    pub fn parse_files(&self, dir: &str, files: &[String]) -> Vec<FeedItem> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for file in files {
            let path = Path::new(dir).join(file);
            let parsed = fs::read_to_string(&path)
                .map_err(ParserError::from)
                .and_then(|content| self.parse(&content));

            match parsed {
                Ok(records) => {
                    let before = items.len();
                    items.extend(
                        records
                            .into_iter()
                            .filter(|item| seen.insert(item.product_id.clone())),
                    );
                    info!("Parsed {}: {} new items", file, items.len() - before);
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        items
    }
}

impl FeedParser for PriceListParser {
    fn parse(&self, content: &str) -> Result<Vec<FeedItem>, ParserError> {
        let expanded = SELF_CLOSING.replace_all(content, "<$1></$1>");
        let document = Html::parse_document(&expanded);

        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for record in document.select(&self.record) {
            let item = self.read_record(&record);
            if item.brand.is_empty() || item.model.is_empty() {
                warn!("Skipping record '{}' without brand or model", item.product_id);
                continue;
            }
            if !seen.insert(item.product_id.clone()) {
                continue;
            }
            items.push(item);
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TyresVIP>
  <tyre>
    <product_id>1001</product_id>
    <brand>Nokian Tyres</brand>
    <model>Hakkapeliitta 9 XL</model>
    <size>205/55 R16</size>
    <width>205</width>
    <height>55</height>
    <diameter>R16</diameter>
    <season>Зимняя</season>
    <thorn>Шипованная</thorn>
    <artikul/>
  </tyre>
  <tyre>
    <product_id>1002</product_id>
    <brand/>
    <model>Orphan</model>
  </tyre>
  <tyre>
    <product_id>1001</product_id>
    <brand>Nokian Tyres</brand>
    <model>Duplicate</model>
  </tyre>
  <tyre>
    <product_id>1003</product_id>
    <brand>Tigar</brand>
    <model>HP &amp; Co</model>
    <artikul>T-77</artikul>
  </tyre>
</TyresVIP>"#;

    #[test]
    fn parses_records_and_fields() {
        let items = PriceListParser::new().unwrap().parse(SAMPLE).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.product_id, "1001");
        assert_eq!(first.brand, "Nokian Tyres");
        assert_eq!(first.model, "Hakkapeliitta 9 XL");
        assert_eq!(first.diameter, "R16");
        assert_eq!(first.thorn, "Шипованная");
        assert_eq!(first.artikul, "");

        assert_eq!(items[1].model, "HP & Co");
        assert_eq!(items[1].artikul, "T-77");
    }

    #[test]
    fn empty_tag_does_not_swallow_siblings() {
        let xml = "<r><tyre><product_id>7</product_id><brand>KAMA</brand><size/><model>Euro</model></tyre></r>";
        let items = PriceListParser::new().unwrap().parse(xml).unwrap();
        assert_eq!(items[0].size, "");
        assert_eq!(items[0].model, "Euro");
    }

    #[test]
    fn duplicates_across_files_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.xml"), SAMPLE).unwrap();
        fs::write(
            dir.path().join("b.xml"),
            "<x><tyre><product_id>1003</product_id><brand>Tigar</brand><model>Again</model></tyre>\
             <tyre><product_id>2001</product_id><brand>KAMA</brand><model>Euro</model></tyre></x>",
        )
        .unwrap();

        let files = vec!["a.xml".to_string(), "missing.xml".to_string(), "b.xml".to_string()];
        let items = PriceListParser::new()
            .unwrap()
            .parse_files(dir.path().to_str().unwrap(), &files);

        let ids: Vec<&str> = items.iter().map(|item| item.product_id.as_str()).collect();
        assert_eq!(ids, vec!["1001", "1003", "2001"]);
    }
}
