// scraper.rs
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;

use crate::config::ScraperConfig;
use crate::scraper::models::ScrapedRow;
use crate::scraper::parse::{has_bid_table, parse_rows};
use crate::scraper::ScraperError;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

const MAX_CONSECUTIVE_FAILURES: usize = 3;

/// What the page callback wants the pagination loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageControl {
    Continue,
    Stop,
}

pub struct BolpatraScraper {
    client: Client,
    base_url: Url,
    max_pages: usize,
    page_delay: Duration,
}

impl BolpatraScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ScraperError::Config(format!(
                "base_url {} cannot carry a path",
                config.base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            max_pages: config.max_pages,
            page_delay: Duration::from_millis(config.page_delay_ms),
        })
    }

    /// Walk the listing pages, handing each page's rows to `on_page`.
    /// Returns the number of pages handed over.
    pub fn fetch_pages<F>(&self, on_page: F) -> Result<usize, ScraperError>
    where
        F: FnMut(Vec<ScrapedRow>) -> Result<PageControl, ScraperError>,
    {
        paginate(
            &self.base_url,
            self.max_pages,
            self.page_delay,
            |url| self.fetch_html(url),
            on_page,
        )
    }

    pub fn fetch_html(&self, url: &Url) -> Result<String, ScraperError> {
        const MAX_ATTEMPTS: u64 = 3;
        const MAX_BACKOFF_SECS: u64 = 10;
        const JITTER_MAX_SECS: u64 = 2;

        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let start = Instant::now();

            match self.try_fetch_html(url) {
                Ok(html) => {
                    info!(%url, attempt, elapsed = ?start.elapsed(), "page fetched");
                    return Ok(html);
                }
                Err(e @ ScraperError::Blocked(_)) => return Err(e),
                Err(e) => {
                    warn!(%url, attempt, elapsed = ?start.elapsed(), error = %e, "fetch attempt failed");
                    last_err = Some(e);

                    if attempt < MAX_ATTEMPTS {
                        let base = std::cmp::min(2 * attempt, MAX_BACKOFF_SECS);
                        let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_SECS);
                        std::thread::sleep(Duration::from_secs(base + jitter));
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ScraperError::Network("retry loop failed".into())))
    }

    pub fn try_fetch_html(&self, url: &Url) -> Result<String, ScraperError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScraperError::Blocked(format!("HTTP {status} for {url}")));
        }

        let text = resp
            .text()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ScraperError::Network(format!("HTTP {status} for {url}")));
        }

        Ok(text)
    }
}

/// `<base>/searchOpportunity?currentPageIndex=<page>`, pages from 1.
fn page_url(base: &Url, page: usize) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("searchOpportunity");
    }
    url.query_pairs_mut()
        .clear()
        .append_pair("currentPageIndex", &page.to_string());
    url
}

/// Pagination loop. Stops at `max_pages`, on an empty page, on a page whose
/// rows repeat an earlier page, or when `on_page` says so. A page that keeps
/// failing is retried until `MAX_CONSECUTIVE_FAILURES`, then the run fails.
fn paginate<G, F>(
    base: &Url,
    max_pages: usize,
    delay: Duration,
    mut fetch: G,
    mut on_page: F,
) -> Result<usize, ScraperError>
where
    G: FnMut(&Url) -> Result<String, ScraperError>,
    F: FnMut(Vec<ScrapedRow>) -> Result<PageControl, ScraperError>,
{
    let mut page = 1;
    let mut pages_handled = 0;
    let mut consecutive_failures = 0;
    let mut seen_signatures = HashSet::new();

    while page <= max_pages {
        let url = page_url(base, page);
        info!(page, %url, "scraping page");

        let rows = match fetch(&url).and_then(|html| page_rows(&html)) {
            Ok(rows) => rows,
            Err(e) => {
                consecutive_failures += 1;
                warn!(page, attempt = consecutive_failures, error = %e, "page failed");
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(e);
                }
                std::thread::sleep(delay);
                continue;
            }
        };
        consecutive_failures = 0;

        if rows.is_empty() {
            info!(page, "no rows found, stopping");
            break;
        }

        let signature: Vec<String> = rows.iter().map(|r| r.ifb_no.clone()).collect();
        if !seen_signatures.insert(signature) {
            info!(page, "page repeats an earlier one, stopping");
            break;
        }

        info!(page, rows = rows.len(), "page parsed");
        pages_handled += 1;
        if on_page(rows)? == PageControl::Stop {
            info!(page, "stop requested");
            break;
        }

        page += 1;
        std::thread::sleep(delay);
    }

    Ok(pages_handled)
}

/// A page without the bid table is a failure, not an empty page.
fn page_rows(html: &str) -> Result<Vec<ScrapedRow>, ScraperError> {
    if !has_bid_table(html) {
        return Err(ScraperError::HtmlParse("bid table missing from page".into()));
    }
    parse_rows(html)
}
