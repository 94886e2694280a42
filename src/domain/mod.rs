pub mod filter;
pub mod keywords;
pub mod relevance;
pub mod stats;
pub mod tender;
pub mod validation;

