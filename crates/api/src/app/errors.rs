use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use fieldkit_core::DomainError;
use fieldkit_infra::command_dispatcher::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::TenantIsolation(msg) => {
            json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg)
        }
        DispatchError::Domain(e) => domain_error_to_response(e),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

/// Map a deterministic domain rejection onto a status + stable error code.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_)
        | DomainError::InvalidQuantity(_)
        | DomainError::DamageSeverityRequired(_)
        | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound => StatusCode::NOT_FOUND,
        DomainError::InvalidTransition(_)
        | DomainError::DuplicatePart(_)
        | DomainError::ToolUnavailable(_)
        | DomainError::AlreadyReturned(_)
        | DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::InvariantViolation(_)
        | DomainError::InsufficientStock(_)
        | DomainError::InsufficientWarehouseStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };

    let message = err.to_string();
    json_error(status, err.code(), message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
