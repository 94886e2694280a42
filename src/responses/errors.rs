use astra::{Body, Response, ResponseBuilder};
use serde_json::json;
use tracing::{error, warn};

use crate::errors::ServerError;

pub type ResultResp = Result<Response, ServerError>;

/// Render a ServerError as `{ "error", "message", "fields"? }`.
pub fn error_response(err: ServerError) -> Response {
    let status = err.status();
    if status >= 500 {
        error!(kind = err.kind(), error = %err, "request failed");
    } else {
        warn!(kind = err.kind(), error = %err, "request rejected");
    }

    let mut body = json!({
        "error": err.kind(),
        "message": err.to_string(),
    });
    if let ServerError::Validation(fields) = &err {
        body["fields"] = json!(fields);
    }

    let text = body.to_string();
    ResponseBuilder::new()
        .status(status)
        .header("Content-Type", mime::APPLICATION_JSON.as_ref())
        .body(Body::from(text.clone()))
        .unwrap_or_else(|_| Response::new(Body::from(text)))
}
