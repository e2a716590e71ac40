use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Connection failed to {tenant}: {cause}")]
    ConnectionFailed { tenant: String, cause: String },

    #[error("Connection to {tenant} is unavailable: {cause}")]
    ConnectionUnavailable { tenant: String, cause: String },

    #[error("Materialization of {table} failed in {tenant}: {cause}")]
    MaterializationFailed {
        tenant: String,
        table: String,
        cause: String,
    },

    #[error("Storage not found: {storage_id}")]
    StorageNotFound { storage_id: String },

    #[error("Datasource not found: {tenant}")]
    DatasourceNotFound { tenant: String },

    #[error("Model not found: {table} in storage {storage_id}")]
    ModelNotFound { storage_id: String, table: String },

    #[error("Record not found: {table}/{id}")]
    RecordNotFound { table: String, id: String },

    #[error("Import failed: {cause}")]
    ImportFailed { cause: String },

    #[error("Query failed on {table}: {cause}")]
    QueryFailed { table: String, cause: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable machine-readable kind, used as the `error` field of responses.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::ConnectionFailed { .. } => "connection_failed",
            GatewayError::ConnectionUnavailable { .. } => "connection_unavailable",
            GatewayError::MaterializationFailed { .. } => "materialization_failed",
            GatewayError::StorageNotFound { .. } => "storage_not_found",
            GatewayError::DatasourceNotFound { .. } => "datasource_not_found",
            GatewayError::ModelNotFound { .. } => "model_not_found",
            GatewayError::RecordNotFound { .. } => "record_not_found",
            GatewayError::ImportFailed { .. } => "import_failed",
            GatewayError::QueryFailed { .. } => "query_failed",
            GatewayError::InvalidRequest { .. } => "invalid_request",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(rename = "storageId", skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
}

impl GatewayError {
    /// Error response that also names the storage the failure belongs to
    pub fn into_storage_response(self, storage_id: &str) -> Response {
        let (status, mut error_response) = self.response_parts();
        error_response.storage_id = Some(storage_id.to_string());
        (status, Json(error_response)).into_response()
    }

    fn response_parts(&self) -> (StatusCode, ErrorResponse) {
        let error = self.kind().to_string();

        match self {
            GatewayError::ConnectionFailed { tenant, cause } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error,
                    message: format!("Failed to connect to datasource '{}'", tenant),
                    tenant: Some(tenant.clone()),
                    cause: Some(cause.clone()),
                    storage_id: None,
                },
            ),
            GatewayError::ConnectionUnavailable { tenant, cause } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error,
                    message: format!("Datasource '{}' is in an errored state", tenant),
                    tenant: Some(tenant.clone()),
                    cause: Some(cause.clone()),
                    storage_id: None,
                },
            ),
            GatewayError::MaterializationFailed {
                tenant,
                table,
                cause,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error,
                    message: format!("Failed to create table '{}'", table),
                    tenant: Some(tenant.clone()),
                    cause: Some(cause.clone()),
                    storage_id: None,
                },
            ),
            GatewayError::StorageNotFound { storage_id } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error,
                    message: format!("Storage '{}' not found", storage_id),
                    tenant: None,
                    cause: None,
                    storage_id: None,
                },
            ),
            GatewayError::DatasourceNotFound { tenant } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error,
                    message: format!("Datasource '{}' is not found", tenant),
                    tenant: Some(tenant.clone()),
                    cause: None,
                    storage_id: None,
                },
            ),
            GatewayError::ModelNotFound { storage_id, table } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error,
                    message: format!(
                        "Table '{}' is not available in storage '{}'",
                        table, storage_id
                    ),
                    tenant: None,
                    cause: None,
                    storage_id: None,
                },
            ),
            GatewayError::RecordNotFound { table, id } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error,
                    message: format!("Record '{}' not found in '{}'", id, table),
                    tenant: None,
                    cause: None,
                    storage_id: None,
                },
            ),
            GatewayError::ImportFailed { cause } => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse {
                    error,
                    message: "Account import failed".to_string(),
                    tenant: None,
                    cause: Some(cause.clone()),
                    storage_id: None,
                },
            ),
            GatewayError::QueryFailed { table, cause } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error,
                    message: format!("Query on '{}' failed", table),
                    tenant: None,
                    cause: Some(cause.clone()),
                    storage_id: None,
                },
            ),
            GatewayError::InvalidRequest { message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error,
                    message: message.clone(),
                    tenant: None,
                    cause: None,
                    storage_id: None,
                },
            ),
            GatewayError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error,
                    message: msg.clone(),
                    tenant: None,
                    cause: None,
                    storage_id: None,
                },
            ),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.response_parts();
        (status, Json(error_response)).into_response()
    }
}

impl From<tokio_postgres::Error> for GatewayError {
    fn from(err: tokio_postgres::Error) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for GatewayError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        GatewayError::Internal(format!("Pool error: {}", err))
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Internal(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_family_maps_to_404() {
        let errors = [
            GatewayError::StorageNotFound {
                storage_id: "s1".to_string(),
            },
            GatewayError::DatasourceNotFound {
                tenant: "memory:shop".to_string(),
            },
            GatewayError::ModelNotFound {
                storage_id: "s1".to_string(),
                table: "widgets".to_string(),
            },
        ];

        for err in errors {
            assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_connection_errors_map_to_503() {
        let err = GatewayError::ConnectionUnavailable {
            tenant: "postgresql:shop".to_string(),
            cause: "refused".to_string(),
        };
        assert_eq!(err.kind(), "connection_unavailable");
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_storage_response_keeps_status() {
        let err = GatewayError::ConnectionFailed {
            tenant: "memory:shop".to_string(),
            cause: "refused".to_string(),
        };
        let response = err.into_storage_response("s-1");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
