//! Build-plan executor: the single `build` entry point.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::RunConfig;
use crate::driver::TargetDriver;
use crate::error::{BuildError, IoContext, Result};
use crate::plan::{resolve, BuildRequest, PlanSpec, ResolvedBuild, VersionOracle};
use crate::process::Runner;
use crate::toolchain::Toolchain;
use crate::workspace::{OutputSdk, WorkDir};

/// One library placed in the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedLibrary {
    pub scheme: String,
    pub target: String,
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub version: String,
    pub sdk_dir: PathBuf,
    /// Set when the work directory was kept.
    pub work_dir: Option<PathBuf>,
    pub libraries: Vec<StagedLibrary>,
}

/// Drives the toolchain for every target of a resolved plan.
pub struct Executor<'a> {
    config: RunConfig,
    runner: &'a dyn Runner,
}

impl<'a> Executor<'a> {
    pub fn new(config: RunConfig, runner: &'a dyn Runner) -> Self {
        Self { config, runner }
    }

    /// Resolve the request and build it.
    ///
    /// Validation happens before anything external runs: a request without an
    /// output directory fails without invoking the version oracle or the
    /// toolchain.
    pub fn build(
        &self,
        spec: &PlanSpec,
        request: &BuildRequest,
        oracle: &dyn VersionOracle,
    ) -> Result<BuildReport> {
        let resolved = resolve(spec, request, oracle)?;
        self.run(&resolved)
    }

    /// Build every target of an already resolved plan.
    pub fn run(&self, resolved: &ResolvedBuild) -> Result<BuildReport> {
        let plan = &resolved.plan;
        info!(output_root = %resolved.output_root.display(), "will save SDK");

        let work = WorkDir::create(self.config.keep_temp)?;
        info!(path = %work.path().display(), "using temp dir");
        if !plan.defines.is_empty() {
            info!(defines = %plan.defines.definitions(), "using extra preprocessor flags");
        }
        if let Some(dir) = &self.config.developer_dir {
            info!(path = %dir.display(), "using developer directory");
        }

        let sdk = OutputSdk::prepare(&resolved.output_root, &resolved.sdk_dir_name)?;
        info!(path = %sdk.root().display(), "assembling SDK");

        let toolchain = Toolchain::new(self.runner, &self.config);
        let driver = TargetDriver {
            toolchain: &toolchain,
            plan,
            work: &work,
            sdk: &sdk,
        };

        let mut libraries = Vec::with_capacity(plan.targets.len());
        for target in &plan.targets {
            let staged = driver.build(target)?;
            let (size, sha256) = digest(&staged)?;
            info!(path = %staged.display(), size, "staged library");
            libraries.push(StagedLibrary {
                scheme: target.scheme.clone(),
                target: target.target.clone(),
                path: staged,
                size,
                sha256,
            });
        }

        let staged: Vec<PathBuf> = libraries.iter().map(|lib| lib.path.clone()).collect();
        check_listing(sdk.root(), &staged, sdk.files()?)?;

        Ok(BuildReport {
            version: resolved.version.clone(),
            sdk_dir: sdk.root().to_path_buf(),
            work_dir: work.finish(),
            libraries,
        })
    }
}

fn digest(path: &Path) -> Result<(u64, String)> {
    let mut file = File::open(path).io_context(|| format!("opening '{}'", path.display()))?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)
        .io_context(|| format!("reading '{}'", path.display()))?;
    Ok((size, format!("{:x}", hasher.finalize())))
}

/// The SDK must hold exactly one file per staged library and nothing else.
fn check_listing(sdk_dir: &Path, staged: &[PathBuf], found: Vec<PathBuf>) -> Result<()> {
    let missing: Vec<PathBuf> = staged
        .iter()
        .filter(|path| !found.contains(path))
        .cloned()
        .collect();
    let unexpected: Vec<PathBuf> = found
        .into_iter()
        .filter(|path| !staged.contains(path))
        .collect();
    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }
    Err(BuildError::SdkMismatch {
        sdk_dir: sdk_dir.to_path_buf(),
        unexpected,
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_digest_matches_known_hash() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("libempty.a");
        fs::write(&path, b"").unwrap();
        let (size, hash) = digest(&path).unwrap();
        assert_eq!(size, 0);
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_streams_large_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("libbig.a");
        let bytes = vec![0x5a_u8; 3 * 1024 * 1024 + 17];
        fs::write(&path, &bytes).unwrap();
        let (size, hash) = digest(&path).unwrap();
        assert_eq!(size, bytes.len() as u64);
        assert_eq!(hash, format!("{:x}", Sha256::digest(&bytes)));
    }

    #[test]
    fn test_check_listing_accepts_exact_contents() {
        let sdk = Path::new("/out/sdk");
        let staged = vec![sdk.join("OpenCV/libcore.a"), sdk.join("OpenCV/libimgproc.a")];
        assert!(check_listing(sdk, &staged, staged.clone()).is_ok());
    }

    #[test]
    fn test_check_listing_reports_strays_and_gaps() {
        let sdk = Path::new("/out/sdk");
        let staged = vec![sdk.join("OpenCV/libcore.a"), sdk.join("OpenCV/libimgproc.a")];
        let found = vec![sdk.join("OpenCV/libcore.a"), sdk.join("OpenCV/.libimgproc.a.partial")];
        match check_listing(sdk, &staged, found).unwrap_err() {
            BuildError::SdkMismatch {
                unexpected, missing, ..
            } => {
                assert_eq!(unexpected, vec![sdk.join("OpenCV/.libimgproc.a.partial")]);
                assert_eq!(missing, vec![sdk.join("OpenCV/libimgproc.a")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_report_serializes() {
        let report = BuildReport {
            version: "2.4.9".into(),
            sdk_dir: PathBuf::from("/out/opencv_ios_sdk_2.4.9"),
            work_dir: None,
            libraries: vec![StagedLibrary {
                scheme: "opencv_core".into(),
                target: "opencv_core".into(),
                path: PathBuf::from("/out/opencv_ios_sdk_2.4.9/OpenCV/libopencv_core.a"),
                size: 42,
                sha256: "00".into(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["version"], "2.4.9");
        assert_eq!(json["libraries"][0]["size"], 42);
        assert!(json["work_dir"].is_null());
    }
}
