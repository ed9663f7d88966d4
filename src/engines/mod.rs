mod document;
mod image;
mod pdf;

pub use document::DocumentEngine;
pub use image::ImageEngine;
pub use pdf::{parse_info, parse_page_count, PdfEngine, PdfInfo};

use crate::config::ToolPaths;
use crate::error::{AppError, Result};
use crate::options::ConvertOptions;
use crate::platform::{Platform, ToolTable};
use crate::process::{CommandRunner, Invocation, ProcessOutput};
use crate::signature::Family;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything an engine needs to reach the outside world.
#[derive(Clone)]
pub struct ToolContext {
    pub platform: Platform,
    pub paths: ToolPaths,
    pub runner: Arc<dyn CommandRunner>,
}

impl ToolContext {
    pub fn new(platform: Platform, paths: ToolPaths, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            platform,
            paths,
            runner,
        }
    }

    /// Resolve the tool table, failing fast on an unsupported platform.
    pub fn tools(&self) -> Result<ToolTable> {
        ToolTable::resolve(&self.platform, &self.paths)
    }

    pub async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        self.runner.run(invocation).await
    }

    /// `true` when the version check exits 0. Never spawns on an unsupported platform.
    async fn tool_responds<F>(&self, build: F) -> bool
    where
        F: FnOnce(&ToolTable) -> Invocation,
    {
        let tools = match self.tools() {
            Ok(tools) => tools,
            Err(_) => return false,
        };
        self.run(&build(&tools))
            .await
            .map(|out| out.success())
            .unwrap_or(false)
    }
}

/// Output format an engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Pdf,
    Jpeg,
}

impl Target {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "pdf" => Ok(Target::Pdf),
            "jpeg" | "jpg" => Ok(Target::Jpeg),
            other => Err(AppError::InvalidRequest(format!(
                "Unknown target format: {}",
                other
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Target::Pdf => "pdf",
            Target::Jpeg => "jpg",
        }
    }

    pub fn content_type(self) -> mime::Mime {
        match self {
            Target::Pdf => mime::APPLICATION_PDF,
            Target::Jpeg => mime::IMAGE_JPEG,
        }
    }
}

/// Result of a successful conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub output_path: PathBuf,
    /// Combined tool output
    pub log: String,
    /// Problems that did not fail the conversion
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineType {
    Document,
    Image,
    Pdf,
}

/// Trait that all conversion engines must implement
#[async_trait]
pub trait ConvertEngine: Send + Sync {
    fn engine_type(&self) -> EngineType;

    /// Input family this engine accepts
    fn family(&self) -> Family;

    fn target(&self) -> Target;

    /// Defaults used when the caller passes no options; `None` for engines
    /// that take none.
    fn default_options(&self) -> Option<ConvertOptions>;

    /// Check the file signature without converting anything.
    async fn is_valid(&self, input_path: &Path) -> Result<bool> {
        crate::signature::check_path(input_path, self.family()).await
    }

    /// Check if the external tool is installed
    async fn is_available(&self) -> bool;

    async fn convert(
        &self,
        input_path: &Path,
        output_path: &Path,
        options: Option<ConvertOptions>,
    ) -> Result<ConversionReport>;
}
