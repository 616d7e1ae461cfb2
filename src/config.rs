//! Run configuration.
//!
//! Everything that changes how a run talks to the toolchain lives here and is
//! fixed before the executor is constructed.

use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// Project directory relative to the repository root.
pub const PROJECT_SUBDIR: &str = "OpenCV-iOS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Log every toolchain command line at `info`.
    pub verbose: bool,
    /// Exported to every toolchain invocation as `DEVELOPER_DIR`.
    pub developer_dir: Option<PathBuf>,
    /// Working directory of every toolchain invocation.
    pub project_dir: PathBuf,
    /// Leave the temporary work directory behind for inspection.
    pub keep_temp: bool,
}

impl RunConfig {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            ..Self::default()
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    /// Select the developer directory. The path must exist.
    pub fn with_developer_dir(mut self, dir: &Path) -> Result<Self> {
        check_developer_dir(dir)?;
        self.developer_dir = Some(dir.to_path_buf());
        Ok(self)
    }
}

/// Fail with a configuration error unless `dir` exists.
pub fn check_developer_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        Ok(())
    } else {
        Err(BuildError::configuration(format!(
            "{} is not a valid path",
            dir.display()
        )))
    }
}
