//! # CLI UI Module
//!
//! Styling and formatting layer for kbpick output.
//!
//! Human output uses prefixed messages (`[ok]`, `[err]`, ...) and aligned
//! tables; every listing command also has a `--json` form for scripts.
//! Colors follow `--color` and `NO_COLOR`.
//!
//! ## Module Structure
//!
//! - `color`: Color mode detection and terminal width
//! - `style`: Message types, prefixes, status colors
//! - `format`: Relative times, truncation, counts
//! - `table`: Resource and connection tables with comfy-table
//! - `progress`: Spinner shown while remote mutations run

pub mod color;
pub mod format;
pub mod progress;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use progress::{Progress, ProgressMode};
pub use style::{MessageType, Style};
