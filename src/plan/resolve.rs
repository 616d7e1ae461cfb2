//! Turns a build request plus static configuration into a concrete plan and
//! the name of the SDK output directory.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};
use crate::plan::{
    ArchitectureSpec, BuildPlan, PlanSpec, PreprocessorFlags, DEFAULT_PRIMARY_SDK,
    DEFAULT_SECONDARY_SDK,
};

/// Prefix of every SDK output directory name.
pub const SDK_DIR_PREFIX: &str = "opencv_ios_sdk_";

pub const OUTDIR_USAGE: &str = "\
You must provide an output directory, the parent of the generated SDK.
Example usage:
  ios-sdk-builder build --outdir ~            normal build
  ios-sdk-builder build --outdir ~ -D FOO=1   build with a preprocessor override";

/// Inputs of one `build` call.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub output_dir: Option<PathBuf>,
    pub primary_sdk: Option<String>,
    pub secondary_sdk: Option<String>,
    pub defines: PreprocessorFlags,
}

/// Source of the version string embedded in the SDK directory name.
pub trait VersionOracle {
    fn version(&self) -> Result<String>;
}

/// A version string supplied up front.
#[derive(Debug, Clone)]
pub struct FixedVersion(pub String);

impl VersionOracle for FixedVersion {
    fn version(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Result of resolution: where the SDK goes and what gets built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBuild {
    /// Absolute parent directory of the SDK.
    pub output_root: PathBuf,
    /// `opencv_ios_sdk_<version>[_<flags>]`.
    pub sdk_dir_name: String,
    pub version: String,
    pub plan: BuildPlan,
}

impl ResolvedBuild {
    pub fn sdk_dir(&self) -> PathBuf {
        self.output_root.join(&self.sdk_dir_name)
    }
}

/// Resolve a request against the static plan.
///
/// The output directory is validated before the version oracle is consulted,
/// so a request without one fails without touching anything external.
pub fn resolve(
    spec: &PlanSpec,
    request: &BuildRequest,
    oracle: &dyn VersionOracle,
) -> Result<ResolvedBuild> {
    let output_dir = request
        .output_dir
        .as_deref()
        .filter(|dir| !dir.as_os_str().is_empty())
        .ok_or_else(|| BuildError::configuration(OUTDIR_USAGE))?;
    spec.validate()?;

    let output_root = absolute_output_root(output_dir)?;

    let primary_sdk = request
        .primary_sdk
        .clone()
        .unwrap_or_else(|| DEFAULT_PRIMARY_SDK.to_string());
    let secondary_sdk = request
        .secondary_sdk
        .clone()
        .unwrap_or_else(|| DEFAULT_SECONDARY_SDK.to_string());

    let secondary = spec
        .architectures
        .iter()
        .map(|entry| {
            ArchitectureSpec::new(
                entry.arch.clone(),
                entry.sdk.clone().unwrap_or_else(|| secondary_sdk.clone()),
            )
        })
        .collect();

    let version = oracle.version()?;
    let version = version.trim();
    if version.is_empty() || version.contains(['/', '\\']) {
        return Err(BuildError::configuration(format!(
            "unusable version string '{version}'"
        )));
    }

    let sdk_dir_name = sdk_dir_name(version, &request.defines);

    Ok(ResolvedBuild {
        output_root,
        sdk_dir_name,
        version: version.to_string(),
        plan: BuildPlan {
            targets: spec.targets.clone(),
            variant: spec.variant.clone(),
            primary_sdk,
            secondary,
            defines: request.defines.clone(),
        },
    })
}

/// `opencv_ios_sdk_<version>` followed by the encoded overrides.
pub fn sdk_dir_name(version: &str, defines: &PreprocessorFlags) -> String {
    format!("{SDK_DIR_PREFIX}{version}{}", defines.dir_suffix())
}

fn absolute_output_root(dir: &Path) -> Result<PathBuf> {
    let expanded = expand_home(dir)?;
    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = env::current_dir()
        .map_err(|e| BuildError::configuration(format!("resolving current directory: {e}")))?;
    Ok(cwd.join(expanded))
}

fn expand_home(dir: &Path) -> Result<PathBuf> {
    let Ok(rest) = dir.strip_prefix("~") else {
        return Ok(dir.to_path_buf());
    };
    let home = dirs::home_dir().ok_or_else(|| {
        BuildError::configuration(format!(
            "cannot expand '{}': home directory unknown",
            dir.display()
        ))
    })?;
    Ok(home.join(rest))
}
