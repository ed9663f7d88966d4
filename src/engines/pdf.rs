use super::{ConversionReport, ConvertEngine, EngineType, Target, ToolContext};
use crate::error::{AppError, Result};
use crate::options::ConvertOptions;
use crate::process::{map_exit, map_stdout_exit, Capture, Invocation};
use crate::signature::{self, Family};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info};

// identify repeats the format once per page, hence the newline.
const PAGE_COUNT_FORMAT: &str = "%n\n";
const INFO_FORMAT: &str = "%w,%h,%n\n";

/// Geometry of a PDF as reported by `identify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PdfInfo {
    pub width: u32,
    pub height: u32,
    pub pages: u32,
}

/// PDF to JPEG through ImageMagick, plus `identify` queries.
pub struct PdfEngine {
    ctx: ToolContext,
}

impl PdfEngine {
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
        signature::require(input_path, Family::Pdf).await?;

        let opts = options.unwrap_or_else(ConvertOptions::pdf_defaults);
        let invocation = Invocation::new(&tools.convert).args(opts.to_args(input_path, output_path));

        info!("Rasterising {} to JPEG", input_path.display());
        let output = self.ctx.run(&invocation).await?;
        let log = map_exit(output, opts.verbose, "pdf")?;

        Ok(ConversionReport {
            output_path: output_path.to_path_buf(),
            log,
            warnings: Vec::new(),
        })
    }

    pub async fn page_count(&self, input_path: &Path) -> Result<u32> {
        let text = self.identify(input_path, PAGE_COUNT_FORMAT).await?;
        parse_page_count(&text)
    }

    pub async fn info(&self, input_path: &Path) -> Result<PdfInfo> {
        let text = self.identify(input_path, INFO_FORMAT).await?;
        parse_info(&text)
    }

    async fn identify(&self, input_path: &Path, format: &str) -> Result<String> {
        let tools = self.ctx.tools()?;
        signature::require(input_path, Family::Pdf).await?;

        let invocation = Invocation::new(&tools.identify)
            .args(["-format", format])
            .arg(input_path)
            .capture(Capture::Stdout);
        let output = self.ctx.run(&invocation).await.map_err(|e| {
            error!("identify could not be run: {}", e);
            e
        })?;
        map_stdout_exit(output, "identify")
    }
}

fn first_line(output: &str) -> &str {
    output
        .lines()
        .map(|line| line.trim().trim_matches('"'))
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

fn parse_field(field: &'static str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|source| AppError::ParseOutput {
            field,
            value: value.to_string(),
            source,
        })
}

/// Parse `identify -format "%n"` output.
pub fn parse_page_count(output: &str) -> Result<u32> {
    parse_field("page count", first_line(output))
}

/// Parse `identify -format "%w,%h,%n"` output, e.g. `612,792,10`.
pub fn parse_info(output: &str) -> Result<PdfInfo> {
    let fields: Vec<&str> = first_line(output).split(',').collect();
    if fields.len() < 3 {
        return Err(AppError::CouldNotGetData(output.to_string()));
    }

    Ok(PdfInfo {
        width: parse_field("width", fields[0])?,
        height: parse_field("height", fields[1])?,
        pages: parse_field("pages", fields[2])?,
    })
}

#[async_trait]
impl ConvertEngine for PdfEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Pdf
    }

    fn family(&self) -> Family {
        Family::Pdf
    }

    fn target(&self) -> Target {
        Target::Jpeg
    }

    fn default_options(&self) -> Option<ConvertOptions> {
        Some(ConvertOptions::pdf_defaults())
    }

    /// Conversion needs `convert`, the queries need `identify`.
    async fn is_available(&self) -> bool {
        self.ctx
            .tool_responds(|tools| Invocation::new(&tools.convert).arg("-version"))
            .await
            && self
                .ctx
                .tool_responds(|tools| Invocation::new(&tools.identify).arg("-version"))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolPaths;
    use crate::platform::Platform;
    use crate::process::testing::{arg_strings, FakeRunner};
    use crate::process::ProcessOutput;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn pdf_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("brochure.pdf");
        std::fs::write(&path, b"%PDF-1.5\n").unwrap();
        path
    }

    fn engine(platform: Platform, runner: Arc<FakeRunner>) -> PdfEngine {
        PdfEngine::new(ToolContext::new(platform, ToolPaths::default(), runner))
    }

    #[test]
    fn test_parse_info() {
        let info = parse_info("612,792,10").unwrap();
        assert_eq!(
            info,
            PdfInfo {
                width: 612,
                height: 792,
                pages: 10
            }
        );
    }

    #[test]
    fn test_parse_info_first_page_of_many() {
        let info = parse_info("612,792,3\n612,792,3\n612,792,3\n").unwrap();
        assert_eq!(info.pages, 3);
        assert_eq!(parse_info("\"595,842,1\"").unwrap().width, 595);
    }

    #[test]
    fn test_parse_info_too_few_fields() {
        let err = parse_info("612,792").unwrap_err();
        assert!(matches!(err, AppError::CouldNotGetData(ref out) if out == "612,792"));
        assert!(err.to_string().starts_with("Could not get data!"));
        assert!(matches!(parse_info(""), Err(AppError::CouldNotGetData(_))));
    }

    #[test]
    fn test_parse_info_non_numeric() {
        let err = parse_info("612,abc,10").unwrap_err();
        assert!(matches!(
            err,
            AppError::ParseOutput { field: "height", .. }
        ));
    }

    #[test]
    fn test_parse_page_count() {
        assert_eq!(parse_page_count("10\n").unwrap(), 10);
        assert_eq!(parse_page_count("  4\n4\n4\n4\n").unwrap(), 4);
        assert!(matches!(
            parse_page_count("identify: not authorized"),
            Err(AppError::ParseOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_info_invokes_identify() {
        let dir = tempfile::tempdir().unwrap();
        let input = pdf_file(&dir);
        let runner = Arc::new(FakeRunner::replying([(0, "612,792,2\n612,792,2\n")]));

        let info = engine(Platform::Linux, runner.clone())
            .info(&input)
            .await
            .unwrap();
        assert_eq!(info.pages, 2);

        let calls = runner.calls();
        assert_eq!(calls[0].program, "identify");
        assert_eq!(calls[0].capture, Capture::Stdout);
        assert_eq!(
            arg_strings(&calls[0]),
            vec![
                "-format".to_string(),
                "%w,%h,%n\n".to_string(),
                input.to_string_lossy().into_owned()
            ]
        );
    }

    #[tokio::test]
    async fn test_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let input = pdf_file(&dir);
        let runner = Arc::new(FakeRunner::replying([(0, "7\n")]));

        let pages = engine(Platform::MacOs, runner.clone())
            .page_count(&input)
            .await
            .unwrap();
        assert_eq!(pages, 7);
        assert_eq!(arg_strings(&runner.calls()[0])[1], "%n\n");
    }

    #[tokio::test]
    async fn test_identify_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = pdf_file(&dir);
        let runner = Arc::new(FakeRunner::replying([(1, "")]));

        let err = engine(Platform::Linux, runner)
            .page_count(&input)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ToolFailed(_)));
    }

    #[tokio::test]
    async fn test_identify_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let input = pdf_file(&dir);
        let runner = Arc::new(FakeRunner::from_outputs([ProcessOutput {
            exit_code: Some(1),
            output: Vec::new(),
            stderr: b"identify: not authorized `brochure.pdf'\n".to_vec(),
        }]));

        let err = engine(Platform::Linux, runner)
            .info(&input)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ToolFailed(_)));
        assert_eq!(err.to_string(), "identify: not authorized `brochure.pdf'\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_identify_stub_writing_stderr() {
        use crate::process::SystemRunner;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let input = pdf_file(&dir);
        let stub = dir.path().join("identify");
        std::fs::write(
            &stub,
            "#!/bin/sh\necho 'identify: not authorized PDF' >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let paths = ToolPaths {
            identify: stub.to_string_lossy().into_owned(),
            ..ToolPaths::default()
        };
        let engine = PdfEngine::new(ToolContext::new(
            Platform::Linux,
            paths,
            Arc::new(SystemRunner),
        ));

        let err = engine.page_count(&input).await.unwrap_err();
        assert!(matches!(err, AppError::ToolFailed(_)));
        assert_eq!(err.to_string(), "identify: not authorized PDF\n");
    }

    #[tokio::test]
    async fn test_availability_needs_convert_and_identify() {
        let runner = Arc::new(FakeRunner::replying([(127, ""), (0, "")]));
        assert!(!engine(Platform::Linux, runner.clone()).is_available().await);
        assert_eq!(runner.calls()[0].program, "convert");

        let runner = Arc::new(FakeRunner::replying([(0, ""), (127, "")]));
        assert!(!engine(Platform::Linux, runner.clone()).is_available().await);
        let programs: Vec<_> = runner.calls().into_iter().map(|c| c.program).collect();
        assert_eq!(programs, ["convert", "identify"]);

        let runner = Arc::new(FakeRunner::default());
        assert!(engine(Platform::Linux, runner).is_available().await);
    }

    #[tokio::test]
    async fn test_queries_validate_signature_first() {
        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("short.pdf");
        std::fs::write(&short, b"%PD").unwrap();
        let wrong = dir.path().join("wrong.pdf");
        std::fs::write(&wrong, b"PK\x03\x04").unwrap();

        let runner = Arc::new(FakeRunner::default());
        let engine = engine(Platform::Linux, runner.clone());
        assert!(matches!(
            engine.info(&short).await,
            Err(AppError::FileTooSmall { needed: 4, got: 3 })
        ));
        assert!(matches!(
            engine.page_count(&wrong).await,
            Err(AppError::InvalidSignature)
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_default_conversion_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let input = pdf_file(&dir);
        let output = dir.path().join("page.jpg");
        let runner = Arc::new(FakeRunner::default());

        engine(Platform::Linux, runner.clone())
            .convert_to_jpeg(&input, &output, None)
            .await
            .unwrap();

        let args = arg_strings(&runner.calls()[0]);
        assert_eq!(args[..5], ["-verbose", "-colorspace", "sRGB", "-density", "225"]);
        assert_eq!(args[5], input.to_string_lossy());
        assert!(args.windows(2).any(|w| w == ["-resize", "60%"]));
        assert_eq!(args.last().unwrap(), &output.to_string_lossy().into_owned());
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let runner = Arc::new(FakeRunner::default());
        let engine = engine(Platform::Unsupported("android".into()), runner.clone());
        let missing = Path::new("/nowhere/x.pdf");

        assert!(matches!(
            engine.convert_to_jpeg(missing, Path::new("x.jpg"), None).await,
            Err(AppError::UnsupportedPlatform(_))
        ));
        assert!(matches!(
            engine.page_count(missing).await,
            Err(AppError::UnsupportedPlatform(_))
        ));
        assert!(matches!(
            engine.info(missing).await,
            Err(AppError::UnsupportedPlatform(_))
        ));
        assert!(runner.calls().is_empty());
    }
}
