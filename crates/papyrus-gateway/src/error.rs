use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use papyrus_memory::MemoryError;
use papyrus_memory::document::DocumentError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Error returned to API clients as `{"error": "..."}` JSON.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<MemoryError> for ApiError {
    fn from(err: MemoryError) -> Self {
        let status = match &err {
            MemoryError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            MemoryError::InvalidDocumentId(_) => StatusCode::BAD_REQUEST,
            MemoryError::Document(doc) => match doc {
                DocumentError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                DocumentError::FileTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                DocumentError::EmptyDocument | DocumentError::Pdf(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                DocumentError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            MemoryError::Llm(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
            // Internal detail stays in the logs.
            Self::new(status, "internal error")
        } else {
            Self::new(status, err.to_string())
        }
    }
}
