//! External toolchain capabilities.
//!
//! - [`xcodebuild`] - clean, archive and per-architecture build descriptors
//! - [`lipo`] - multi-architecture combine and debug-symbol strip descriptors
//!
//! [`Toolchain`] binds those descriptors to a [`Runner`], the project directory
//! and the developer directory.

pub mod lipo;
pub mod xcodebuild;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::Result;
use crate::plan::{ArchitectureSpec, BuildTarget, PreprocessorFlags};
use crate::process::{Invocation, Runner};

pub use lipo::LipoInput;

/// Environment variable selecting the Xcode used by `xcrun`.
pub const DEVELOPER_DIR_ENV: &str = "DEVELOPER_DIR";

/// The toolchain as seen by the build driver.
pub struct Toolchain<'a> {
    runner: &'a dyn Runner,
    project_dir: PathBuf,
    developer_dir: Option<PathBuf>,
    verbose: bool,
}

impl<'a> Toolchain<'a> {
    pub fn new(runner: &'a dyn Runner, config: &RunConfig) -> Self {
        Self {
            runner,
            project_dir: config.project_dir.clone(),
            developer_dir: config.developer_dir.clone(),
            verbose: config.verbose,
        }
    }

    pub fn clean(&self, target: &BuildTarget, variant: &str, sdk: &str) -> Result<()> {
        self.run(xcodebuild::clean_archive(target, variant, sdk))
    }

    pub fn archive(
        &self,
        target: &BuildTarget,
        variant: &str,
        sdk: &str,
        out_dir: &Path,
    ) -> Result<()> {
        self.run(xcodebuild::archive(target, variant, sdk, out_dir))
    }

    pub fn clean_arch(
        &self,
        target: &BuildTarget,
        arch: &ArchitectureSpec,
        variant: &str,
    ) -> Result<()> {
        self.run(xcodebuild::clean_arch(target, arch, variant))
    }

    pub fn build_arch(
        &self,
        target: &BuildTarget,
        arch: &ArchitectureSpec,
        variant: &str,
        out_dir: &Path,
        defines: &PreprocessorFlags,
    ) -> Result<()> {
        self.run(xcodebuild::build_arch(
            target, arch, variant, out_dir, defines,
        ))
    }

    pub fn combine(&self, inputs: &[LipoInput], output: &Path) -> Result<()> {
        self.run(lipo::combine(inputs, output))
    }

    pub fn strip(&self, library: &Path) -> Result<()> {
        self.run(lipo::strip_debug(library))
    }

    /// Apply the run's environment and execute, failing on non-zero exit.
    fn run(&self, invocation: Invocation) -> Result<()> {
        let invocation = self.prepare(invocation);
        if self.verbose {
            info!(command = %invocation, "running");
        } else {
            debug!(command = %invocation, "running");
        }
        self.runner.run_checked(&invocation)?;
        Ok(())
    }

    fn prepare(&self, invocation: Invocation) -> Invocation {
        let invocation = invocation.current_dir(&self.project_dir);
        match &self.developer_dir {
            Some(dir) => invocation.env(DEVELOPER_DIR_ENV, dir.to_string_lossy()),
            None => invocation,
        }
    }
}

/// Ask `xcode-select` for the active developer directory. Best-effort.
pub fn detect_developer_dir(runner: &dyn Runner) -> Option<PathBuf> {
    let output = runner
        .run(&Invocation::new("xcode-select").arg("-p"))
        .ok()?;
    if !output.is_success() {
        return None;
    }
    let path = output.stdout.trim();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::process::CommandOutput;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<Invocation>>,
        reply: CommandOutput,
    }

    impl Runner for Recorder {
        fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
            self.seen.borrow_mut().push(invocation.clone());
            Ok(self.reply.clone())
        }
    }

    fn config() -> RunConfig {
        RunConfig {
            project_dir: PathBuf::from("/src/OpenCV-iOS"),
            developer_dir: Some(PathBuf::from("/Applications/Xcode.app/Contents/Developer")),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_invocations_get_project_dir_and_developer_dir() {
        let recorder = Recorder {
            reply: CommandOutput::success(),
            ..Default::default()
        };
        let toolchain = Toolchain::new(&recorder, &config());
        toolchain.strip(Path::new("/w/libcore.a")).unwrap();

        let seen = recorder.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get_current_dir(), Some(Path::new("/src/OpenCV-iOS")));
        assert_eq!(
            seen[0].get_env(DEVELOPER_DIR_ENV),
            Some("/Applications/Xcode.app/Contents/Developer")
        );
    }

    #[test]
    fn test_failure_propagates_exit_code() {
        let recorder = Recorder {
            reply: CommandOutput {
                code: Some(65),
                stdout: "** ARCHIVE FAILED **".into(),
                stderr: String::new(),
            },
            ..Default::default()
        };
        let toolchain = Toolchain::new(&recorder, &config());
        let target = BuildTarget::new("core", "core");
        let err = toolchain
            .archive(&target, "Release", "iphoneos", Path::new("/w/Archive"))
            .unwrap_err();
        assert_eq!(err.exit_code(), 65);
        assert!(matches!(err, BuildError::Toolchain { ref stdout, .. } if stdout.contains("ARCHIVE FAILED")));
    }

    #[test]
    fn test_detect_developer_dir() {
        let found = Recorder {
            reply: CommandOutput {
                code: Some(0),
                stdout: "/Applications/Xcode.app/Contents/Developer\n".into(),
                stderr: String::new(),
            },
            ..Default::default()
        };
        assert_eq!(
            detect_developer_dir(&found),
            Some(PathBuf::from("/Applications/Xcode.app/Contents/Developer"))
        );

        let missing = Recorder {
            reply: CommandOutput {
                code: Some(2),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(detect_developer_dir(&missing), None);
    }
}
