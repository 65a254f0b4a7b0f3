// Fetcher module: downloads vendor price files into the local downloads folder.

pub mod http;

pub use http::HttpFetcher;

use crate::model::FetchError;
use std::path::Path;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[async_trait::async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: Vec<String>,
    /// Files whose download failed; the previous local copy, if any, stays in place.
    pub failed: Vec<String>,
}

/// Downloads every file from `base_url` into `dir`, retrying each up to three times.
pub async fn download_all(
    fetcher: &dyn PriceFetcher,
    base_url: &str,
    files: &[String],
    dir: &str,
) -> Result<DownloadReport, FetchError> {
    tokio::fs::create_dir_all(dir).await?;
    let base_url = base_url.trim_end_matches('/');
    let mut report = DownloadReport::default();

    for file in files {
        let url = format!("{}/{}", base_url, file);
        match fetch_with_retry(fetcher, &url).await {
            Ok(body) => {
                let target = Path::new(dir).join(file);
                tokio::fs::write(&target, &body).await?;
                info!("Downloaded {} ({} bytes)", file, body.len());
                report.downloaded.push(file.clone());
            }
            Err(e) => {
                warn!("Giving up on {}: {}; keeping the previous copy", file, e);
                report.failed.push(file.clone());
            }
        }
    }

    Ok(report)
}

async fn fetch_with_retry(fetcher: &dyn PriceFetcher, url: &str) -> Result<Vec<u8>, FetchError> {
    let mut attempt = 1;
    loop {
        match fetcher.fetch(url).await {
            Ok(body) => return Ok(body),
            Err(e) if attempt < MAX_ATTEMPTS => {
                warn!("Attempt {}/{} for {} failed: {}", attempt, MAX_ATTEMPTS, url, e);
                attempt += 1;
                sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}
