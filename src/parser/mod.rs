// Parser module: vendor price list parsing.

pub mod price_parser;

pub use price_parser::{FeedParser, PriceListParser};
