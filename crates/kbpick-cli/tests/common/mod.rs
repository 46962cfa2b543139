//! Shared test utilities for kbpick-cli integration tests.

#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;

/// Environment variables that would leak the developer's setup into a test.
const KBPICK_ENV: &[&str] = &[
    "KBPICK_CONFIG",
    "KBPICK_VERBOSE",
    "KBPICK_QUIET",
    "KBPICK_COLOR",
    "KBPICK_BACKEND_URL",
    "KBPICK_EMAIL",
    "KBPICK_PASSWORD",
    "KBPICK_ANON_KEY",
];

/// Get a Command for the kbpick binary.
///
/// # Panics
///
/// Panics if the kbpick binary cannot be found. This should not happen
/// in a properly configured test environment.
#[allow(deprecated)]
pub fn kbpick_cmd() -> Command {
    Command::cargo_bin("kbpick").expect("kbpick binary should exist")
}

/// A kbpick command with a clean environment, reading `config`.
pub fn isolated_cmd(config: &Path) -> Command {
    let mut cmd = kbpick_cmd();
    for var in KBPICK_ENV {
        cmd.env_remove(var);
    }
    cmd.arg("--config").arg(config).arg("--color").arg("never");
    cmd
}
