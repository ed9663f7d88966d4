//! Signature-checked wrappers around LibreOffice and ImageMagick.
//!
//! Each conversion sniffs the input's magic bytes, builds the command line
//! for the external tool, runs it and maps its exit status. The HTTP service
//! in [`app`] exposes the same engines.

pub mod config;
pub mod engines;
pub mod error;
pub mod handlers;
pub mod options;
pub mod platform;
pub mod process;
pub mod router;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use handlers::{convert_handler, health_handler, info_handler, inspect_handler, AppState};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, ToolPaths};
pub use engines::{
    ConversionReport, ConvertEngine, DocumentEngine, ImageEngine, PdfEngine, PdfInfo, Target,
    ToolContext,
};
pub use error::{AppError, Result};
pub use options::{ConvertOptions, OptionOverrides};
pub use platform::Platform;
pub use process::{CommandRunner, Invocation, ProcessOutput, SystemRunner};

/// Build the HTTP application around already-constructed state.
pub fn app(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/convert", post(convert_handler))
        .route("/inspect", post(inspect_handler))
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/", get(info_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
