pub mod audit;
pub mod connection;
pub mod presets;
pub mod scrapes;
pub mod seen_keys;
pub mod tenders;

pub use connection::{init_db, Database};
pub use tenders::{SqliteTenderStore, TenderStore};
