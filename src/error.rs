//! Error taxonomy for SDK builds.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Exit code reported for configuration errors.
pub const CONFIGURATION_EXIT_CODE: i32 = 2;

/// Errors that abort an SDK build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Required input missing or invalid. Raised before any external invocation.
    #[error("{0}")]
    Configuration(String),

    /// An external invocation exited unsuccessfully.
    #[error("`{command}` failed ({})\n{stdout}\n{stderr}", describe_code(.code))]
    Toolchain {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// An external program could not be started at all.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A library that an earlier step should have produced is not there.
    #[error("artifact not found: {}", .path.display())]
    ArtifactMissing { path: PathBuf },

    /// The finished SDK does not hold exactly the staged libraries.
    #[error(
        "SDK '{}' does not match the build: unexpected {unexpected:?}, missing {missing:?}",
        .sdk_dir.display()
    )]
    SdkMismatch {
        sdk_dir: PathBuf,
        unexpected: Vec<PathBuf>,
        missing: Vec<PathBuf>,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BuildError>;

impl BuildError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Process exit code for this failure.
    ///
    /// Toolchain failures propagate the tool's own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => CONFIGURATION_EXIT_CODE,
            Self::Toolchain { code: Some(code), .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Attach a context message to an `io::Result`.
pub(crate) trait IoContext<T> {
    fn io_context<F: FnOnce() -> String>(self, context: F) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F: FnOnce() -> String>(self, context: F) -> Result<T> {
        self.map_err(|source| BuildError::Io {
            context: context(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_propagates_toolchain_code() {
        let err = BuildError::Toolchain {
            command: "xcrun lipo".into(),
            code: Some(65),
            stdout: String::new(),
            stderr: "boom".into(),
        };
        assert_eq!(err.exit_code(), 65);
    }

    #[test]
    fn test_exit_code_for_signal_and_configuration() {
        let killed = BuildError::Toolchain {
            command: "xcrun strip".into(),
            code: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(killed.exit_code(), 1);
        assert!(killed.to_string().contains("terminated by signal"));

        let config = BuildError::configuration("no outdir");
        assert_eq!(config.exit_code(), CONFIGURATION_EXIT_CODE);
    }

    #[test]
    fn test_toolchain_error_keeps_output_verbatim() {
        let err = BuildError::Toolchain {
            command: "xcrun xcodebuild clean".into(),
            code: Some(1),
            stdout: "** CLEAN FAILED **".into(),
            stderr: "error: no scheme".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("** CLEAN FAILED **"));
        assert!(rendered.contains("error: no scheme"));
        assert!(rendered.contains("exit code 1"));
    }
}
