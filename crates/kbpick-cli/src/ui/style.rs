//! Message styling for CLI output.
//!
//! Provides consistent prefixes, colors, and formatting for all CLI messages.
//!
//! ## Message Types
//!
//! | Prefix | Meaning | Color |
//! |--------|---------|-------|
//! | `[ok]` | Success | Green |
//! | `[err]` | Error | Red |
//! | `[warn]` | Warning | Yellow |
//! | `[info]` | Information | Blue |
//! | `[hint]` | Suggestion | Cyan |
//! | `[skip]` | Skipped | Dim |

use owo_colors::OwoColorize;

use super::color::ColorMode;

/// Message severity/type for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Operation completed successfully
    Ok,
    /// Operation failed
    Err,
    /// Operation succeeded with caveats
    Warn,
    /// Neutral status
    Info,
    /// Actionable next step
    Hint,
    /// Item was intentionally not processed
    Skip,
}

impl MessageType {
    /// Returns the prefix text for this message type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ok => "[ok]",
            Self::Err => "[err]",
            Self::Warn => "[warn]",
            Self::Info => "[info]",
            Self::Hint => "[hint]",
            Self::Skip => "[skip]",
        }
    }
}

/// Main styling interface for CLI output.
///
/// # Example
///
/// ```ignore
/// let style = Style::new(ColorMode::Never);
/// println!("{}", style.message(MessageType::Ok, "Indexed report.pdf"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Style {
    color_mode: ColorMode,
}

impl Style {
    /// Create a Style instance with an explicit color mode.
    pub fn new(color_mode: ColorMode) -> Self {
        Self { color_mode }
    }

    /// Check if colors are enabled.
    pub fn colors_enabled(&self) -> bool {
        self.color_mode.is_enabled()
    }

    /// Format a simple message with a type prefix, e.g. `[ok] Done`.
    pub fn message(&self, msg_type: MessageType, text: &str) -> String {
        let prefix = msg_type.prefix();
        if self.colors_enabled() {
            let colored_prefix = match msg_type {
                MessageType::Ok => prefix.green().to_string(),
                MessageType::Err => prefix.red().to_string(),
                MessageType::Warn => prefix.yellow().to_string(),
                MessageType::Info => prefix.blue().to_string(),
                MessageType::Hint => prefix.cyan().to_string(),
                MessageType::Skip => prefix.dimmed().to_string(),
            };
            format!("{} {}", colored_prefix, text)
        } else {
            format!("{} {}", prefix, text)
        }
    }

    /// Format a detail line with 5-space indentation.
    pub fn message_detail(&self, label: &str, value: &str) -> String {
        format!("     {}: {}", label, value)
    }

    /// Format a section header.
    pub fn section(&self, title: &str) -> String {
        if self.colors_enabled() {
            title.bold().to_string()
        } else {
            title.to_string()
        }
    }

    /// Format a structured error with optional cause and hint.
    pub fn error_with_context(
        &self,
        msg: &str,
        cause: Option<&str>,
        hint: Option<&str>,
    ) -> String {
        let mut output = self.message(MessageType::Err, msg);

        if let Some(cause_text) = cause {
            output.push('\n');
            output.push_str(&format!("      Cause: {}", cause_text));
        }

        if let Some(hint_text) = hint {
            output.push('\n');
            output.push_str(&format!("      Hint: {}", hint_text));
        }

        output
    }

    /// Format a list item with a prefix marker.
    ///
    /// `+` is colored green, `-` red.
    pub fn list_item(&self, prefix: &str, text: &str) -> String {
        let styled_prefix = if self.colors_enabled() {
            match prefix {
                "+" => prefix.green().to_string(),
                "-" => prefix.red().to_string(),
                _ => prefix.to_string(),
            }
        } else {
            prefix.to_string()
        };
        format!("  {} {}", styled_prefix, text)
    }

    /// Format a drive path (colored cyan).
    pub fn file_path(&self, path: &str) -> String {
        if self.colors_enabled() {
            path.cyan().to_string()
        } else {
            path.to_string()
        }
    }
}
