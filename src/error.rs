use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("The file is too small to be valid (unable to read file signature).")]
    FileTooSmall { needed: usize, got: usize },

    #[error("Invalid file signature.")]
    InvalidSignature,

    #[error("Unsupported platform: {0} (only linux and macos are supported)")]
    UnsupportedPlatform(String),

    /// The external tool could not be started or waited on.
    #[error("{source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit; the message is the tool's captured output, untouched.
    #[error("{0}")]
    ToolFailed(String),

    #[error("Could not get data! {0}")]
    CouldNotGetData(String),

    #[error("Could not parse {field} from identify output {value:?}")]
    ParseOutput {
        field: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// The tool reported success but its output is not where it should be.
    #[error("Converted file is missing: {0}")]
    ConversionOutputMissing(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("No file provided")]
    NoFileProvided,

    #[error("Engine not available: {0}")]
    EngineNotAvailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::FileTooSmall { .. }
            | AppError::InvalidSignature
            | AppError::UnsupportedFormat(_)
            | AppError::NoFileProvided
            | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ToolFailed(_)
            | AppError::CouldNotGetData(_)
            | AppError::ParseOutput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UnsupportedPlatform(_)
            | AppError::EngineNotAvailable(_)
            | AppError::Spawn { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConversionOutputMissing(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
