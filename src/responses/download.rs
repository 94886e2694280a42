// responses/download.rs
use astra::{Body, ResponseBuilder};

use crate::errors::ServerError;
use crate::responses::ResultResp;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Attachment response with the given content type and filename.
pub fn download_response(body: impl Into<Body>, content_type: &str, filename: &str) -> ResultResp {
    let resp = ResponseBuilder::new()
        .status(200)
        .header("Content-Type", content_type)
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        )
        .body(body.into())
        .map_err(|_| ServerError::InternalError)?;

    Ok(resp)
}

pub fn csv_response(text: String, filename: &str) -> ResultResp {
    download_response(text, mime::TEXT_CSV_UTF_8.as_ref(), filename)
}

pub fn xlsx_response(buffer: Vec<u8>, filename: &str) -> ResultResp {
    download_response(buffer, XLSX_CONTENT_TYPE, filename)
}

pub fn backup_response(text: String, filename: &str) -> ResultResp {
    download_response(text, mime::APPLICATION_JSON.as_ref(), filename)
}

pub fn text_response(text: String, filename: &str) -> ResultResp {
    download_response(text, mime::TEXT_PLAIN_UTF_8.as_ref(), filename)
}
