use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::errors::OptimizeError;
use crate::optimizer::context::OptimizationContext;

/// How aggressively the optimizer rewrites the program. Levels are ordered:
/// every pass enabled at some level is also enabled at all higher levels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum OptimizationLevel {
    #[serde(rename = "O0")]
    O0,
    #[serde(rename = "O1")]
    O1,
    #[serde(rename = "O2")]
    O2,
    #[serde(rename = "O3")]
    O3,
}

impl OptimizationLevel {
    /// True when this level enables passes gated at `other`.
    pub fn includes(&self, other: OptimizationLevel) -> bool {
        *self >= other
    }

    /// Mapping for the old boolean `--optimize` flag.
    pub fn from_legacy_flag(enabled: bool) -> Self {
        if enabled {
            OptimizationLevel::O1
        } else {
            OptimizationLevel::O0
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            OptimizationLevel::O0 => 0,
            OptimizationLevel::O1 => 1,
            OptimizationLevel::O2 => 2,
            OptimizationLevel::O3 => 3,
        }
    }
}

impl Default for OptimizationLevel {
    fn default() -> Self {
        OptimizationLevel::O0
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.as_u8())
    }
}

impl FromStr for OptimizationLevel {
    type Err = OptimizeError;

    /// Accepts "0".."3" and "O0".."O3" (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digit = s.strip_prefix('O').or_else(|| s.strip_prefix('o')).unwrap_or(s);
        match digit {
            "0" => Ok(OptimizationLevel::O0),
            "1" => Ok(OptimizationLevel::O1),
            "2" => Ok(OptimizationLevel::O2),
            "3" => Ok(OptimizationLevel::O3),
            _ => Err(OptimizeError::InvalidLevel(s.to_string())),
        }
    }
}

/// A single per-pass tuning knob, e.g. the inlining size threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSetting {
    pub pass: String,
    pub key: String,
    pub value: String,
}

/// Options that control an optimizer run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerOptions {
    /// Optimization level (default: O0)
    #[serde(default)]
    pub level: OptimizationLevel,

    /// Log per-pass reports and the end-of-run summary (default: false)
    #[serde(default)]
    pub debug: bool,

    /// Run each pass's structural validation after it transforms (default: false)
    #[serde(default)]
    pub validate: bool,

    /// Passes to force-enable below their minimum level
    #[serde(default)]
    pub enabled_passes: Vec<String>,

    /// Passes to skip even when the level enables them
    #[serde(default)]
    pub disabled_passes: Vec<String>,

    /// Per-pass settings
    #[serde(default)]
    pub pass_settings: Vec<PassSetting>,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            level: OptimizationLevel::O0,
            debug: false,
            validate: false,
            enabled_passes: Vec::new(),
            disabled_passes: Vec::new(),
            pass_settings: Vec::new(),
        }
    }
}

impl OptimizerOptions {
    pub fn with_level(level: OptimizationLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Load options from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, OptimizeError> {
        let content = std::fs::read_to_string(path)?;
        let options: OptimizerOptions = serde_json::from_str(&content)
            .map_err(|e| OptimizeError::Config(e.to_string()))?;
        Ok(options)
    }

    /// Create default options and write them to a file
    pub fn init_file(path: &Path) -> Result<(), OptimizeError> {
        let options = OptimizerOptions::default();
        let json = serde_json::to_string_pretty(&options)
            .map_err(|e| OptimizeError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Parse a comma-separated pass list as passed on a command line.
    pub fn parse_pass_list(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Translate these options into a fresh per-run context.
    pub fn build_context(&self) -> OptimizationContext {
        let mut context = OptimizationContext::new(self.level);
        context.set_debug_mode(self.debug);
        context.set_validation_enabled(self.validate);
        for pass in &self.enabled_passes {
            context.enable_pass(pass);
        }
        for pass in &self.disabled_passes {
            context.disable_pass(pass);
        }
        for setting in &self.pass_settings {
            context.set_pass_setting(&setting.pass, &setting.key, &setting.value);
        }
        context
    }
}
