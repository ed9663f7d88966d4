use super::{ConversionReport, ConvertEngine, EngineType, Target, ToolContext};
use crate::error::Result;
use crate::options::ConvertOptions;
use crate::process::{map_exit, Invocation};
use crate::signature::{self, Family};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// PNG/JPEG/BMP/PSD to JPEG through ImageMagick `convert`.
pub struct ImageEngine {
    ctx: ToolContext,
}

impl ImageEngine {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    pub async fn convert_to_jpeg(
        &self,
        input_path: &Path,
        output_path: &Path,
        options: Option<ConvertOptions>,
    ) -> Result<ConversionReport> {
        let tools = self.ctx.tools()?;
        signature::require(input_path, Family::Image).await?;

        let opts = options.unwrap_or_else(ConvertOptions::image_defaults);
        let invocation = Invocation::new(&tools.convert).args(opts.to_args(input_path, output_path));

        info!(
            "Converting {} to JPEG using ImageMagick",
            input_path.display()
        );
        let output = self.ctx.run(&invocation).await?;
        let log = map_exit(output, opts.verbose, "img")?;

        Ok(ConversionReport {
            output_path: output_path.to_path_buf(),
            log,
            warnings: Vec::new(),
        })
    }
}

#[async_trait]
impl ConvertEngine for ImageEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Image
    }

    fn family(&self) -> Family {
        Family::Image
    }

    fn target(&self) -> Target {
        Target::Jpeg
    }

    fn default_options(&self) -> Option<ConvertOptions> {
        Some(ConvertOptions::image_defaults())
    }

    async fn is_available(&self) -> bool {
        self.ctx
            .tool_responds(|tools| Invocation::new(&tools.convert).arg("-version"))
            .await
    }

    async fn convert(
        &self,
        input_path: &Path,
        output_path: &Path,
        options: Option<ConvertOptions>,
    ) -> Result<ConversionReport> {
        self.convert_to_jpeg(input_path, output_path, options).await
    }
}
