//! Error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use tvf_core::api::ErrorBody;
use tvf_core::error::{FleetError, RegistryError};

/// An error rendered as a JSON response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Malformed request (400)
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_request",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        let (status, code) = match &err {
            FleetError::Registry(RegistryError::DuplicateIdentifier { .. }) => {
                (StatusCode::CONFLICT, "duplicate_identifier")
            }
            FleetError::Registry(RegistryError::TerminalNotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            FleetError::Registry(RegistryError::LocationNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "location_not_found")
            }
            FleetError::Registry(RegistryError::Invalid(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_request")
            }
            FleetError::Registry(RegistryError::Store(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        } else {
            tracing::debug!("Request rejected: {}", err);
        }

        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvf_core::error::{IdentifierField, StoreError};
    use tvf_core::{LocationType, TerminalId};

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(FleetError, StatusCode, &str)> = vec![
            (
                RegistryError::DuplicateIdentifier {
                    field: IdentifierField::TerminalCode,
                    value: "STB-1".to_string(),
                }
                .into(),
                StatusCode::CONFLICT,
                "duplicate_identifier",
            ),
            (
                RegistryError::TerminalNotFound(TerminalId::new()).into(),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                RegistryError::LocationNotFound {
                    location_type: LocationType::Room,
                    identifier: "404".to_string(),
                }
                .into(),
                StatusCode::NOT_FOUND,
                "location_not_found",
            ),
            (
                RegistryError::Invalid("bad".to_string()).into(),
                StatusCode::BAD_REQUEST,
                "invalid_request",
            ),
            (
                StoreError::Unavailable("down".to_string()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];

        for (err, status, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status(), status);
            assert_eq!(api.code(), code);
        }
    }
}
