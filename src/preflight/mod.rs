//! Preflight checks for build validation.
//!
//! Validates that the host system has the tools the build shells out to, so a
//! missing Xcode fails up front instead of halfway through the first target.
//!
//! # Example
//!
//! ```rust
//! use ios_sdk_builder::preflight::{check_required_tools, command_exists};
//!
//! if !command_exists("xcrun") {
//!     println!("Xcode command line tools not installed");
//! }
//!
//! let tools = &[("xcrun", "Xcode command line tools"), ("git", "git")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use crate::error::{BuildError, Result};

/// Check if a command exists on `PATH`.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Required host tools for building the SDK.
///
/// Each tuple is (command_name, how_to_install).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("xcrun", "Xcode command line tools: xcode-select --install"),
    ("git", "git"),
];

/// Check that specific tools are available.
///
/// Every missing tool is listed, not just the first.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    let msg = missing
        .iter()
        .map(|(t, p)| format!("  {} (install: {})", t, p))
        .collect::<Vec<_>>()
        .join("\n");
    Err(BuildError::configuration(format!(
        "Missing required host tools:\n{}",
        msg
    )))
}

/// Check all tools in [`REQUIRED_TOOLS`].
pub fn check_host_tools() -> Result<()> {
    check_required_tools(REQUIRED_TOOLS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists() {
        // 'ls' should exist on any Unix system
        assert!(command_exists("ls"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_required_tools_success() {
        let tools = &[("ls", "coreutils"), ("cat", "coreutils")];
        assert!(check_required_tools(tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_lists_every_missing_tool() {
        let tools = &[
            ("nonexistent_command_xyz", "fake-package"),
            ("ls", "coreutils"),
            ("another_missing_tool_abc", "other-package"),
        ];
        let err = check_required_tools(tools).unwrap_err().to_string();
        assert!(err.contains("nonexistent_command_xyz (install: fake-package)"));
        assert!(err.contains("another_missing_tool_abc (install: other-package)"));
        assert!(!err.contains("coreutils"));
    }
}
