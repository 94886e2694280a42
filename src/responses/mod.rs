pub mod download;
pub mod errors;
pub mod json;

pub use download::{backup_response, csv_response, text_response, xlsx_response};
pub use errors::{error_response, ResultResp};
pub use json::json_response;
