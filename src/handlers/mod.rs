use crate::engines::{PdfEngine, Target};
use crate::error::{AppError, Result};
use crate::options::OptionOverrides;
use crate::router::SmartRouter;
use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const WARNING_HEADER: &str = "x-filemill-warning";

pub struct AppState {
    pub router: SmartRouter,
    /// Serves `/inspect`
    pub inspector: Arc<PdfEngine>,
}

struct Upload {
    filename: String,
    data: Bytes,
}

#[derive(Default)]
struct ConvertForm {
    upload: Option<Upload>,
    target: Option<String>,
    overrides: Option<OptionOverrides>,
}

async fn read_form(mut multipart: Multipart) -> Result<ConvertForm> {
    let mut form = ConvertForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::InvalidRequest(format!("Failed to parse multipart data: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .ok_or_else(|| AppError::InvalidRequest("No filename provided".to_string()))?
                    .to_string();

                let data = field.bytes().await.map_err(|e| {
                    AppError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?;

                info!("Received file: {} ({} bytes)", filename, data.len());
                form.upload = Some(Upload { filename, data });
            }
            "target" => {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidRequest(format!("Failed to read target: {}", e))
                })?;
                form.target = Some(value);
            }
            "options" => {
                let text = field.text().await.map_err(|e| {
                    AppError::InvalidRequest(format!("Failed to read options: {}", e))
                })?;
                let overrides = serde_json::from_str(&text)
                    .map_err(|e| AppError::InvalidRequest(format!("Invalid options: {}", e)))?;
                form.overrides = Some(overrides);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    Ok(form)
}

/// Write the upload under a random stem so concurrent requests never share
/// a name in the staging directory.
async fn store_upload(dir: &Path, upload: &Upload) -> Result<PathBuf> {
    let ext = Path::new(&upload.filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let input_path = dir.join(format!("{}.{}", Uuid::new_v4(), ext));
    tokio::fs::write(&input_path, &upload.data).await?;
    Ok(input_path)
}

fn original_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
}

/// Conversion endpoint: the engine is picked by sniffing the upload
pub async fn convert_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    let form = read_form(multipart).await?;
    let upload = form.upload.ok_or(AppError::NoFileProvided)?;
    let target = match form.target.as_deref() {
        Some(value) => Target::parse(value)?,
        None => Target::Pdf,
    };

    let temp_dir = tempfile::tempdir()?;
    let input_path = store_upload(temp_dir.path(), &upload).await?;
    let output_path = temp_dir
        .path()
        .join(format!("{}.{}", Uuid::new_v4(), target.extension()));

    let engine = state.router.find_engine_for_file(&input_path, target).await?;
    info!("Using {:?} engine for {}", engine.engine_type(), upload.filename);

    let options = match (engine.default_options(), &form.overrides) {
        (Some(defaults), Some(overrides)) => Some(defaults.merged(overrides)),
        (defaults, _) => defaults,
    };
    let report = engine.convert(&input_path, &output_path, options).await?;

    let data = tokio::fs::read(&report.output_path).await.map_err(|e| {
        let reason = if report.warnings.is_empty() {
            e.to_string()
        } else {
            format!("{} ({})", report.warnings.join("; "), e)
        };
        AppError::ConversionOutputMissing(reason)
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(target.content_type().as_ref())
            .map_err(|e| AppError::Internal(e.to_string()))?,
    );
    let disposition = format!(
        "attachment; filename=\"{}.{}\"",
        original_stem(&upload.filename),
        target.extension()
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    for warning in &report.warnings {
        warn!("{}: {}", upload.filename, warning);
        if let Ok(value) = HeaderValue::from_str(warning) {
            headers.append(HeaderName::from_static(WARNING_HEADER), value);
        }
    }

    Ok((StatusCode::OK, headers, data).into_response())
}

/// PDF geometry endpoint
pub async fn inspect_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    let form = read_form(multipart).await?;
    let upload = form.upload.ok_or(AppError::NoFileProvided)?;

    let temp_dir = tempfile::tempdir()?;
    let input_path = store_upload(temp_dir.path(), &upload).await?;
    let pdf_info = state.inspector.info(&input_path).await?;

    Ok(Json(pdf_info).into_response())
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "filemill"
    }))
}

/// Information endpoint - lists targets and engine availability
pub async fn info_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let engines: Vec<_> = state
        .router
        .engine_status()
        .into_iter()
        .map(|(engine, available)| {
            json!({
                "engine": format!("{:?}", engine),
                "available": available,
            })
        })
        .collect();

    Json(json!({
        "service": "filemill",
        "version": env!("CARGO_PKG_VERSION"),
        "targets": ["pdf", "jpeg"],
        "engines": engines,
        "endpoints": {
            "convert": {
                "path": "/convert",
                "method": "POST",
                "description": "Convert a .doc/.docx to PDF, or a PDF/PNG/JPEG/BMP/PSD to JPEG. The engine is selected from the file signature.",
                "content_type": "multipart/form-data",
                "fields": {
                    "file": "The file to convert (required)",
                    "target": "'pdf' or 'jpeg' (optional, default 'pdf')",
                    "options": "JSON object overriding convert settings: verbose, density, resize, trim, quality, sharpen, whiteBackground, flatten, srgbColorspace (optional, JPEG only)"
                }
            },
            "inspect": {
                "path": "/inspect",
                "method": "POST",
                "description": "Width, height and page count of a PDF",
                "content_type": "multipart/form-data",
                "fields": {
                    "file": "The PDF to inspect (required)"
                }
            },
            "health": {
                "path": "/health",
                "method": "GET",
                "description": "Health check endpoint"
            },
            "info": {
                "path": "/info",
                "method": "GET",
                "description": "Service information and engine availability"
            }
        }
    }))
}
