use axum::http::StatusCode;

use fieldkit_core::AggregateId;

use crate::app::errors;

/// Parse a path/body identifier, producing a 400 with a stable code on
/// failure. `what` names the field in the error message.
pub fn parse_aggregate_id(
    value: &str,
    what: &str,
) -> Result<AggregateId, axum::response::Response> {
    value.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what}"))
    })
}
