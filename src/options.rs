use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;

/// Settings for the ImageMagick `convert` invocation.
///
/// Integer settings use `0` to drop the flag entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertOptions {
    pub verbose: bool,
    /// Rasterisation density in DPI (`-density`).
    pub density: u32,
    /// Resize percentage (`-resize P%`).
    pub resize: u32,
    /// Accepted for compatibility with existing callers; `convert` is never
    /// passed `-trim`.
    pub trim: bool,
    /// JPEG quality (`-quality`).
    pub quality: u32,
    pub sharpen: bool,
    pub white_background: bool,
    pub flatten: bool,
    pub srgb_colorspace: bool,
}

impl ConvertOptions {
    /// Defaults for raster image to JPEG.
    pub fn image_defaults() -> Self {
        Self {
            verbose: true,
            density: 0,
            resize: 0,
            trim: true,
            quality: 60,
            sharpen: true,
            white_background: true,
            flatten: true,
            srgb_colorspace: true,
        }
    }

    /// Defaults for PDF to JPEG.
    pub fn pdf_defaults() -> Self {
        Self {
            density: 225,
            resize: 60,
            ..Self::image_defaults()
        }
    }

    /// Apply whichever fields `overrides` sets.
    pub fn merged(mut self, overrides: &OptionOverrides) -> Self {
        if let Some(v) = overrides.verbose {
            self.verbose = v;
        }
        if let Some(v) = overrides.density {
            self.density = v;
        }
        if let Some(v) = overrides.resize {
            self.resize = v;
        }
        if let Some(v) = overrides.trim {
            self.trim = v;
        }
        if let Some(v) = overrides.quality {
            self.quality = v;
        }
        if let Some(v) = overrides.sharpen {
            self.sharpen = v;
        }
        if let Some(v) = overrides.white_background {
            self.white_background = v;
        }
        if let Some(v) = overrides.flatten {
            self.flatten = v;
        }
        if let Some(v) = overrides.srgb_colorspace {
            self.srgb_colorspace = v;
        }
        self
    }

    /// Build the `convert` argument list.
    ///
    /// `convert` applies settings positionally, so density and colour space
    /// must precede the input and everything else must sit between the input
    /// and the output.
    pub fn to_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(20);

        if self.verbose {
            args.push("-verbose".into());
        }
        if self.srgb_colorspace {
            args.push("-colorspace".into());
            args.push("sRGB".into());
        }
        if self.density > 0 {
            args.push("-density".into());
            args.push(self.density.to_string().into());
        }

        args.push(input.as_os_str().to_owned());

        if self.quality > 0 {
            args.push("-quality".into());
            args.push(self.quality.to_string().into());
        }
        if self.sharpen {
            args.push("-sharpen".into());
            args.push("0x1.0".into());
        }
        if self.resize > 0 {
            args.push("-resize".into());
            args.push(format!("{}%", self.resize).into());
        }
        if self.white_background {
            args.push("-background".into());
            args.push("white".into());
        }
        if self.flatten {
            args.push("-flatten".into());
        }

        args.push(output.as_os_str().to_owned());
        args
    }
}

/// Partial options as sent by HTTP callers; unset fields keep the engine's
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OptionOverrides {
    pub verbose: Option<bool>,
    pub density: Option<u32>,
    pub resize: Option<u32>,
    pub trim: Option<bool>,
    pub quality: Option<u32>,
    pub sharpen: Option<bool>,
    pub white_background: Option<bool>,
    pub flatten: Option<bool>,
    pub srgb_colorspace: Option<bool>,
}
