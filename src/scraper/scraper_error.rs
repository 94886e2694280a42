use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Blocked by site: {0}")]
    Blocked(String),
    #[error("HTML parse error: {0}")]
    HtmlParse(String),
    #[error("Bad listing URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Scraper config error: {0}")]
    Config(String),
    #[error("Store error during ingest: {0}")]
    Store(String),
}
