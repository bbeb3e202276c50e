use std::{fs, path::Path};

use fontdue::{Font, FontSettings};

use crate::{
    config::PatchConfig,
    error::{Result, ScriptError},
};

use super::wrap::{CellMetrics, GlyphMetrics, WordWrapper};

/// Named wrapping configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Default,
    /// Same font, narrower box.
    Secondary,
    Monospace,
    /// Proportional font at an explicit pixel size.
    Sized(u32),
}

/// Every wrapping profile, built once from the configuration.
pub struct FontProfiles {
    proportional: Box<dyn GlyphMetrics>,
    monospace: Option<Box<dyn GlyphMetrics>>,
    px: f32,
    bold: bool,
    line_width: u32,
    secondary_line_width: u32,
    warn_lines: usize,
}

impl FontProfiles {
    /// Load the configured fonts from `font_dir`. Without a proportional
    /// font the engine's own cell metrics are used.
    pub fn from_config(config: &PatchConfig, font_dir: impl AsRef<Path>) -> Result<Self> {
        let font_dir = font_dir.as_ref();
        let proportional: Box<dyn GlyphMetrics> = match &config.custom_font_filename {
            Some(name) => Box::new(load_font(&font_dir.join(name))?),
            None => {
                log::info!("no custom font configured, measuring with stock cell metrics");
                Box::new(CellMetrics)
            }
        };
        let mut profiles = Self::with_metrics(proportional, config);
        if let Some(name) = &config.monospace_font_filename {
            profiles.monospace = Some(Box::new(load_font(&font_dir.join(name))?));
        }
        Ok(profiles)
    }

    pub fn with_metrics(proportional: Box<dyn GlyphMetrics>, config: &PatchConfig) -> Self {
        Self {
            proportional,
            monospace: None,
            px: config.proportional_font_size as f32,
            bold: config.proportional_font_bold,
            line_width: config.proportional_line_width,
            secondary_line_width: config.secondary_line_width(),
            warn_lines: config.num_lines_warn_threshold,
        }
    }

    pub fn with_monospace(mut self, metrics: Box<dyn GlyphMetrics>) -> Self {
        self.monospace = Some(metrics);
        self
    }

    #[inline]
    pub fn has_monospace(&self) -> bool {
        self.monospace.is_some()
    }

    /// Wrapper for `profile`. `Monospace` falls back to `Default` when no
    /// monospace font is loaded.
    pub fn wrapper(&self, profile: Profile) -> WordWrapper<'_> {
        let proportional = &*self.proportional;
        let wrapper = match profile {
            Profile::Default => WordWrapper::new(proportional, self.px, self.line_width),
            Profile::Secondary => WordWrapper::new(proportional, self.px, self.secondary_line_width),
            Profile::Sized(px) => WordWrapper::new(proportional, px as f32, self.line_width),
            Profile::Monospace => match &self.monospace {
                Some(mono) => WordWrapper::new(&**mono, self.px, self.line_width),
                None => WordWrapper::new(proportional, self.px, self.line_width),
            },
        };
        wrapper.bold(self.bold).warn_lines(self.warn_lines)
    }
}

fn load_font(path: &Path) -> Result<Font> {
    if !path.exists() {
        return Err(ScriptError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path)?;
    let font = Font::from_bytes(bytes, FontSettings::default())
        .map_err(|e| ScriptError::Config(format!("failed to load font {}: {}", path.display(), e)))?;
    log::info!("loaded font {}", path.display());
    Ok(font)
}
