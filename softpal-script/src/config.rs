use std::{fs, path::Path};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::{
    consts::{GAME_DEFAULT_FONT_HEIGHT, GAME_DEFAULT_MAX_LINE_WIDTH, GAME_DEFAULT_SPACING_BETWEEN_LINES},
    error::{Result, ScriptError},
};

pub const CONFIG_FILE_NAME: &str = "VNTranslationToolsConstants.json";

/// Settings shared with the runtime proxy, read from `VNTranslationToolsConstants.json`.
///
/// Keys the patcher does not use (window mode, y offsets, ...) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchConfig {
    pub debug_logging: bool,
    /// Proportional font used to measure wrapped text.
    pub custom_font_filename: Option<String>,
    pub monospace_font_filename: Option<String>,
    /// Added to an explicit `<sN>` size before picking a wrapping profile.
    pub font_height_increase: i32,
    /// Replacement for the engine's line spacing constant.
    pub font_y_spacing_between_lines: u16,
    pub proportional_font_size: u32,
    pub proportional_font_bold: bool,
    pub proportional_line_width: u32,
    pub secondary_proportional_line_width: Option<u32>,
    /// Replacement for the engine's max line width constant.
    pub max_line_width: u16,
    /// Warn when wrapping produces more lines than this; 0 disables the check.
    pub num_lines_warn_threshold: usize,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            custom_font_filename: None,
            monospace_font_filename: None,
            font_height_increase: 0,
            font_y_spacing_between_lines: GAME_DEFAULT_SPACING_BETWEEN_LINES,
            proportional_font_size: GAME_DEFAULT_FONT_HEIGHT,
            proportional_font_bold: false,
            proportional_line_width: GAME_DEFAULT_MAX_LINE_WIDTH as u32,
            secondary_proportional_line_width: None,
            max_line_width: GAME_DEFAULT_MAX_LINE_WIDTH,
            num_lines_warn_threshold: 0,
        }
    }
}

impl PatchConfig {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScriptError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = fs::read(path)?;
        Self::from_json(&bytes)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| ScriptError::Config(e.to_string()))
    }

    pub fn secondary_line_width(&self) -> u32 {
        self.secondary_proportional_line_width
            .unwrap_or(self.proportional_line_width)
    }

    pub fn level_filter(&self) -> LevelFilter {
        if self.debug_logging {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}
