//! Version and repository lookups through `git`.

use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};
use crate::plan::VersionOracle;
use crate::process::{Invocation, Runner};

/// Tags that mark releases of the iOS SDK, e.g. `iOS_2.4`.
pub const TAG_PATTERN: &str = "iOS_[0-9]*.[0-9]*";

/// Length of the `iOS_` tag prefix removed from `git describe` output.
const TAG_PREFIX_LEN: usize = 4;

const DIRTY_SUFFIX: &str = "-dirty";

/// Version from `git describe` of the repository at `repo`.
pub struct GitDescribe<'a> {
    runner: &'a dyn Runner,
    repo: PathBuf,
    show_dirty: bool,
}

impl<'a> GitDescribe<'a> {
    pub fn new(runner: &'a dyn Runner, repo: impl Into<PathBuf>, show_dirty: bool) -> Self {
        Self {
            runner,
            repo: repo.into(),
            show_dirty,
        }
    }
}

impl VersionOracle for GitDescribe<'_> {
    fn version(&self) -> Result<String> {
        let inv = Invocation::new("git")
            .arg("describe")
            .arg(format!("--match={TAG_PATTERN}"))
            .args(["--tags", "--always", "--dirty"])
            .current_dir(&self.repo);
        let output = self.runner.run_checked(&inv)?;
        version_from_describe(&output.stdout, self.show_dirty)
    }
}

/// Strip the tag prefix and, unless asked to keep it, the dirty marker.
pub fn version_from_describe(describe: &str, show_dirty: bool) -> Result<String> {
    let describe = describe.trim();
    let version = describe.get(TAG_PREFIX_LEN..).unwrap_or_default();
    if version.is_empty() {
        return Err(BuildError::configuration(format!(
            "cannot derive a version from `git describe` output '{describe}'"
        )));
    }
    if show_dirty {
        Ok(version.to_string())
    } else {
        Ok(version.replace(DIRTY_SUFFIX, ""))
    }
}

/// Top level of the git checkout containing `dir`.
pub fn repo_root(runner: &dyn Runner, dir: &Path) -> Result<PathBuf> {
    let inv = Invocation::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(dir);
    let output = runner.run_checked(&inv)?;
    Ok(PathBuf::from(output.stdout.trim()))
}
