use std::path::PathBuf;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Where the external tools live. Every field can be overridden from the
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// LibreOffice launcher used on Linux (`SOFFICE_PATH`)
    pub soffice: String,
    /// Python interpreter bundled with LibreOffice on macOS (`UNOCONV_PYTHON`)
    pub unoconv_python: String,
    /// unoconv script run by that interpreter (`UNOCONV_PATH`)
    pub unoconv: String,
    /// ImageMagick `convert` (`CONVERT_PATH`)
    pub convert: String,
    /// ImageMagick `identify` (`IDENTIFY_PATH`)
    pub identify: String,
    /// Directory LibreOffice writes into before the result is moved
    /// (`FILEMILL_STAGING_DIR`)
    pub staging_dir: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            soffice: "libreoffice".to_string(),
            unoconv_python: "/Applications/LibreOffice.app/Contents/MacOS/python".to_string(),
            unoconv: "/usr/local/bin/unoconv".to_string(),
            convert: "convert".to_string(),
            identify: "identify".to_string(),
            staging_dir: PathBuf::from("/tmp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: String,
    pub tools: ToolPaths,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source; empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = ToolPaths::default();

        Self {
            addr: get("FILEMILL_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            tools: ToolPaths {
                soffice: get("SOFFICE_PATH").unwrap_or(defaults.soffice),
                unoconv_python: get("UNOCONV_PYTHON").unwrap_or(defaults.unoconv_python),
                unoconv: get("UNOCONV_PATH").unwrap_or(defaults.unoconv),
                convert: get("CONVERT_PATH").unwrap_or(defaults.convert),
                identify: get("IDENTIFY_PATH").unwrap_or(defaults.identify),
                staging_dir: get("FILEMILL_STAGING_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.staging_dir),
            },
        }
    }
}
