//! Build plan model.
//!
//! - [`PlanSpec`] - static configuration (built-in defaults or a TOML file)
//! - [`BuildPlan`] - the concrete plan for one run, produced by [`resolve`]
//! - [`flags`] - preprocessor overrides and their directory-name encoding
//! - [`layout`] - work directory layout and artifact bookkeeping

pub mod flags;
pub mod layout;
pub mod resolve;

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{BuildError, Result};

pub use flags::PreprocessorFlags;
pub use layout::{ArtifactPaths, ArtifactSlot};
pub use resolve::{resolve, BuildRequest, FixedVersion, ResolvedBuild, VersionOracle};

pub const DEFAULT_VARIANT: &str = "Release";
pub const DEFAULT_PRIMARY_SDK: &str = "iphoneos";
pub const DEFAULT_SECONDARY_SDK: &str = "iphonesimulator";

/// Default libraries: (scheme, target).
pub const DEFAULT_TARGETS: &[(&str, &str)] = &[
    ("opencv_core", "opencv_core"),
    ("opencv_imgproc", "opencv_imgproc"),
];

/// Architectures not covered by the device archive.
pub const DEFAULT_SECONDARY_ARCHS: &[&str] = &["i386", "x86_64"];

/// One library to produce.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildTarget {
    pub scheme: String,
    pub target: String,
}

impl BuildTarget {
    pub fn new(scheme: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            target: target.into(),
        }
    }

    /// File name of the static library this target produces.
    pub fn library_name(&self) -> String {
        format!("lib{}.a", self.target)
    }
}

/// A secondary (architecture, SDK) pair built with its own invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchitectureSpec {
    pub arch: String,
    pub sdk: String,
}

impl ArchitectureSpec {
    pub fn new(arch: impl Into<String>, sdk: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            sdk: sdk.into(),
        }
    }
}

/// Everything one run builds. Never mutated once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub targets: Vec<BuildTarget>,
    pub variant: String,
    pub primary_sdk: String,
    pub secondary: Vec<ArchitectureSpec>,
    pub defines: PreprocessorFlags,
}

/// Secondary architecture entry of a [`PlanSpec`]. Without an SDK, the run's
/// secondary SDK is used.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchEntry {
    pub arch: String,
    pub sdk: Option<String>,
}

/// Static build configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanSpec {
    #[serde(default = "default_variant")]
    pub variant: String,
    pub targets: Vec<BuildTarget>,
    #[serde(default = "default_architectures")]
    pub architectures: Vec<ArchEntry>,
}

fn default_variant() -> String {
    DEFAULT_VARIANT.to_string()
}

fn default_architectures() -> Vec<ArchEntry> {
    DEFAULT_SECONDARY_ARCHS
        .iter()
        .map(|arch| ArchEntry {
            arch: arch.to_string(),
            sdk: None,
        })
        .collect()
}

impl Default for PlanSpec {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            targets: DEFAULT_TARGETS
                .iter()
                .map(|(scheme, target)| BuildTarget::new(*scheme, *target))
                .collect(),
            architectures: default_architectures(),
        }
    }
}

impl PlanSpec {
    /// Load a plan from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            BuildError::configuration(format!("reading plan file '{}': {e}", path.display()))
        })?;
        Self::parse(&text).map_err(|e| {
            BuildError::configuration(format!("invalid plan file '{}': {e}", path.display()))
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        let spec: PlanSpec =
            toml::from_str(text).map_err(|e| BuildError::configuration(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Reject plans that cannot produce a sensible SDK.
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(BuildError::configuration("plan declares no targets"));
        }
        if self.variant.trim().is_empty() {
            return Err(BuildError::configuration("plan variant is empty"));
        }
        for target in &self.targets {
            check_component("scheme", &target.scheme)?;
            check_component("target", &target.target)?;
        }
        let mut seen = Vec::new();
        for entry in &self.architectures {
            check_component("architecture", &entry.arch)?;
            if matches!(entry.arch.as_str(), "Archive" | "universal") {
                return Err(BuildError::configuration(format!(
                    "architecture name '{}' is reserved",
                    entry.arch
                )));
            }
            if seen.contains(&entry.arch) {
                return Err(BuildError::configuration(format!(
                    "architecture '{}' declared twice",
                    entry.arch
                )));
            }
            seen.push(entry.arch.clone());
        }
        let mut libraries: Vec<_> = self.targets.iter().map(BuildTarget::library_name).collect();
        libraries.sort();
        if libraries.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(BuildError::configuration(
                "two targets produce the same library file",
            ));
        }
        Ok(())
    }
}

/// Names become path components; keep them to a single plain component.
fn check_component(what: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\'])
        && !value.chars().any(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(BuildError::configuration(format!(
            "invalid {what} name '{value}'"
        )))
    }
}
