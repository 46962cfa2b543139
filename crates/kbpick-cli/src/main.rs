//! # kbpick CLI
//!
//! Command-line file picker for a knowledge-base backend.
//!
//! This binary browses the connected drive through `kbpick-core` and toggles
//! which files and folders are indexed. Run `kbpick --help` for usage.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
