use super::{ConversionReport, ConvertEngine, EngineType, Target, ToolContext};
use crate::error::Result;
use crate::options::ConvertOptions;
use crate::process::map_exit;
use crate::signature::{self, Family};
use async_trait::async_trait;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

// EXDEV on Linux and macOS
const CROSS_DEVICE: i32 = 18;

fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(CROSS_DEVICE)
}

/// Move the staged PDF to `to`; `rename` cannot cross filesystems, so that
/// case falls back to copy and delete.
async fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Err(e) if is_cross_device(&e) => {
            debug!(
                "{} and {} are on different filesystems, copying",
                from.display(),
                to.display()
            );
            copy_then_remove(from, to).await
        }
        other => other,
    }
}

async fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

/// `.doc`/`.docx` to PDF through LibreOffice.
pub struct DocumentEngine {
    ctx: ToolContext,
}

impl DocumentEngine {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    pub async fn convert_to_pdf(
        &self,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<ConversionReport> {
        let tools = self.ctx.tools()?;
        signature::require(input_path, Family::Document).await?;

        let strategy = &tools.document;
        let invocation = strategy.invocation(input_path, output_path).mirrored();
        info!(
            "Converting {} to PDF on {}: {}",
            input_path.display(),
            self.ctx.platform.name(),
            invocation.command_line()
        );

        let output = self.ctx.run(&invocation).await?;
        info!(
            "LibreOffice exited with {:?} for {}",
            output.exit_code,
            input_path.display()
        );
        let log = map_exit(output, true, "doc")?;

        let mut warnings = Vec::new();
        if let Some(staged) = strategy.staged_output(input_path) {
            // The PDF already exists; a failed move is reported, not fatal.
            if let Err(e) = relocate(&staged, output_path).await {
                let message = format!(
                    "Converted PDF could not be moved from {} to {}: {}",
                    staged.display(),
                    output_path.display(),
                    e
                );
                warn!("{}", message);
                warnings.push(message);
            }
        }

        Ok(ConversionReport {
            output_path: output_path.to_path_buf(),
            log,
            warnings,
        })
    }
}

#[async_trait]
impl ConvertEngine for DocumentEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Document
    }

    fn family(&self) -> Family {
        Family::Document
    }

    fn target(&self) -> Target {
        Target::Pdf
    }

    fn default_options(&self) -> Option<ConvertOptions> {
        None
    }

    async fn is_available(&self) -> bool {
        self.ctx
            .tool_responds(|tools| tools.document.version_check())
            .await
    }

    async fn convert(
        &self,
        input_path: &Path,
        output_path: &Path,
        _options: Option<ConvertOptions>,
    ) -> Result<ConversionReport> {
        self.convert_to_pdf(input_path, output_path).await
    }
}
