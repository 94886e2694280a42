pub mod ingest;
pub mod models;
pub mod parse;
mod scraper;
mod scraper_error;

pub use ingest::run_scrape;
pub use scraper::{BolpatraScraper, PageControl};
pub use scraper_error::ScraperError;
