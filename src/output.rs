//! # Output Configuration
//!
//! Whether CLI output uses color and emoji markers. The decision honors:
//! - `--color=never|always|auto`
//! - `NO_COLOR` (any value disables colors, see https://no-color.org/)
//! - `CLICOLOR=0` and `CLICOLOR_FORCE=1`
//! - `TERM=dumb`
//!
//! ```rust,ignore
//! use artsync::output::{Marker, OutputConfig};
//!
//! let out = OutputConfig::from_env_and_flag("auto");
//! println!("{} Checking repo files", out.marker(Marker::Scan));
//! ```

use std::env;

use console::style;

use crate::report::RunReport;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

/// Status markers printed in front of CLI messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Scan,
    Ok,
    Warn,
    DryRun,
}

impl OutputConfig {
    /// `color_flag` is the value of `--color`: "always", "never" or "auto".
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }

    /// Emoji when colors are on, a bracketed word otherwise.
    pub fn marker(&self, marker: Marker) -> &'static str {
        match (marker, self.use_color) {
            (Marker::Scan, true) => "🔍",
            (Marker::Scan, false) => "[SCAN]",
            (Marker::Ok, true) => "✅",
            (Marker::Ok, false) => "[OK]",
            (Marker::Warn, true) => "⚠️",
            (Marker::Warn, false) => "[WARN]",
            (Marker::DryRun, true) => "🔎",
            (Marker::DryRun, false) => "[DRY RUN]",
        }
    }

    /// Renders the report one counter per line; non-zero counters are bold
    /// when colors are on.
    pub fn render_report(&self, report: &RunReport) -> String {
        report
            .counters()
            .into_iter()
            .map(|(label, value)| {
                if self.use_color && value > 0 {
                    format!("{}: {}\n", label, style(value).bold())
                } else {
                    format!("{}: {}\n", label, value)
                }
            })
            .collect()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}
