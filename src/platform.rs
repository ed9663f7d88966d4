//! Per-platform tool resolution.
//!
//! Only Linux and macOS have known tool layouts; everything else is rejected
//! before any binary is looked up.

use crate::config::ToolPaths;
use crate::error::{AppError, Result};
use crate::process::Invocation;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Unsupported(String),
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` style identifier.
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            other => Platform::Unsupported(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Unsupported(name) => name,
        }
    }
}

/// How the office suite is driven to produce a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStrategy {
    /// `soffice --headless --convert-to pdf --outdir <staging_dir> <input>`;
    /// the result must then be moved to the requested path.
    Headless { soffice: String, staging_dir: PathBuf },
    /// `<python> <unoconv> -f pdf -o <output> <input>`; writes the requested
    /// path directly.
    Unoconv { python: String, script: String },
}

impl DocumentStrategy {
    pub fn invocation(&self, input: &Path, output: &Path) -> Invocation {
        match self {
            DocumentStrategy::Headless {
                soffice,
                staging_dir,
            } => Invocation::new(soffice)
                .args(["--headless", "--convert-to", "pdf", "--outdir"])
                .arg(staging_dir)
                .arg(input),
            DocumentStrategy::Unoconv { python, script } => Invocation::new(python)
                .arg(script)
                .args(["-f", "pdf", "-o"])
                .arg(output)
                .arg(input),
        }
    }

    /// Where the suite leaves its PDF when that is not `output` itself.
    pub fn staged_output(&self, input: &Path) -> Option<PathBuf> {
        match self {
            DocumentStrategy::Headless { staging_dir, .. } => {
                let mut name = input.file_stem()?.to_os_string();
                name.push(".pdf");
                Some(staging_dir.join(name))
            }
            DocumentStrategy::Unoconv { .. } => None,
        }
    }

    /// Command used to decide whether the suite is installed.
    pub fn version_check(&self) -> Invocation {
        match self {
            DocumentStrategy::Headless { soffice, .. } => {
                Invocation::new(soffice).arg("--version")
            }
            DocumentStrategy::Unoconv { python, script } => {
                Invocation::new(python).arg(script).arg("--version")
            }
        }
    }
}

/// Programs resolved for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolTable {
    pub document: DocumentStrategy,
    pub convert: String,
    pub identify: String,
}

impl ToolTable {
    pub fn resolve(platform: &Platform, paths: &ToolPaths) -> Result<Self> {
        let document = match platform {
            Platform::Linux => DocumentStrategy::Headless {
                soffice: paths.soffice.clone(),
                staging_dir: paths.staging_dir.clone(),
            },
            Platform::MacOs => DocumentStrategy::Unoconv {
                python: paths.unoconv_python.clone(),
                script: paths.unoconv.clone(),
            },
            Platform::Unsupported(name) => {
                return Err(AppError::UnsupportedPlatform(name.clone()));
            }
        };

        Ok(Self {
            document,
            convert: paths.convert.clone(),
            identify: paths.identify.clone(),
        })
    }
}
