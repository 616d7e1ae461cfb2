//! Per-target build sequence.
//!
//! ```text
//! clean -> archive -> (clean -> build) per secondary arch -> combine -> strip -> stage
//! ```
//!
//! Every step is fatal on failure and runs strictly after the previous one.

use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::plan::layout::slot_dir;
use crate::plan::{ArchitectureSpec, ArtifactPaths, ArtifactSlot, BuildPlan, BuildTarget};
use crate::toolchain::{LipoInput, Toolchain};
use crate::workspace::{OutputSdk, WorkDir};

/// Shared state for building the targets of one run.
pub struct TargetDriver<'a> {
    pub toolchain: &'a Toolchain<'a>,
    pub plan: &'a BuildPlan,
    pub work: &'a WorkDir,
    pub sdk: &'a OutputSdk,
}

impl TargetDriver<'_> {
    /// Build one target through all steps and stage its library.
    /// Returns the staged path.
    pub fn build(&self, target: &BuildTarget) -> Result<PathBuf> {
        let mut artifacts = ArtifactPaths::new();

        self.build_archive(target, &mut artifacts)?;
        for arch in &self.plan.secondary {
            self.build_secondary(target, arch, &mut artifacts)?;
        }
        let universal = self.merge(target, &mut artifacts)?;

        info!(target_name = %target.target, step = "strip", "stripping debug symbols");
        self.toolchain.strip(&universal)?;

        info!(target_name = %target.target, step = "stage", "staging library");
        self.sdk.stage(&universal)
    }

    fn step_dir(&self, target: &BuildTarget, slot: &ArtifactSlot) -> Result<PathBuf> {
        let dir = slot_dir(
            self.work.path(),
            &self.plan.variant,
            &target.scheme,
            &target.target,
            slot,
        );
        self.work.create_step_dir(&dir)
    }

    fn build_archive(&self, target: &BuildTarget, artifacts: &mut ArtifactPaths) -> Result<()> {
        let plan = self.plan;
        info!(
            target_name = %target.target,
            variant = %plan.variant,
            step = "archive",
            "building archive (architectures from the project build settings)"
        );
        self.toolchain.clean(target, &plan.variant, &plan.primary_sdk)?;

        let dir = self.step_dir(target, &ArtifactSlot::Archive)?;
        self.toolchain
            .archive(target, &plan.variant, &plan.primary_sdk, &dir)?;
        artifacts.record(&ArtifactSlot::Archive, dir);
        Ok(())
    }

    fn build_secondary(
        &self,
        target: &BuildTarget,
        arch: &ArchitectureSpec,
        artifacts: &mut ArtifactPaths,
    ) -> Result<()> {
        let plan = self.plan;
        info!(
            target_name = %target.target,
            arch = %arch.arch,
            sdk = %arch.sdk,
            step = "build",
            "building secondary architecture"
        );
        self.toolchain.clean_arch(target, arch, &plan.variant)?;

        let slot = ArtifactSlot::Arch(arch.arch.clone());
        let dir = self.step_dir(target, &slot)?;
        self.toolchain
            .build_arch(target, arch, &plan.variant, &dir, &plan.defines)?;
        artifacts.record(&slot, dir);
        Ok(())
    }

    /// Combine the archive library with every secondary library. All inputs
    /// must exist before the combine runs.
    fn merge(&self, target: &BuildTarget, artifacts: &mut ArtifactPaths) -> Result<PathBuf> {
        let library = target.library_name();

        let mut inputs = vec![LipoInput::base(
            artifacts.library(&ArtifactSlot::Archive, &library)?,
        )];
        for arch in &self.plan.secondary {
            let slot = ArtifactSlot::Arch(arch.arch.clone());
            inputs.push(LipoInput::tagged(
                arch.arch.clone(),
                artifacts.library(&slot, &library)?,
            ));
        }

        info!(
            target_name = %target.target,
            inputs = inputs.len(),
            step = "combine",
            "combining architectures"
        );
        let dir = self.step_dir(target, &ArtifactSlot::Universal)?;
        let output = dir.join(&library);
        self.toolchain.combine(&inputs, &output)?;
        artifacts.record(&ArtifactSlot::Universal, dir);

        artifacts.library(&ArtifactSlot::Universal, &library)
    }
}
