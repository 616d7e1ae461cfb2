//! Assembles a multi-architecture static library SDK for iOS.
//!
//! The crate drives an external toolchain; it never compiles anything itself.
//! For each library target it:
//!
//! 1. cleans and archives the device architectures with `xcodebuild`
//! 2. cleans and builds every secondary (simulator) architecture on its own
//! 3. combines all slices into one universal library with `lipo`
//! 4. strips debug symbols with `strip -S`
//! 5. copies the result into `<outdir>/opencv_ios_sdk_<version>[_<flags>]/OpenCV/`
//!
//! # Architecture
//!
//! ```text
//! plan ──────────► resolve() ──► ResolvedBuild
//!                                     │
//! executor::Executor ─────────────────┤
//!     ├── workspace: WorkDir (temp) + OutputSdk
//!     └── driver::TargetDriver (one target at a time)
//!             └── toolchain::Toolchain
//!                     └── process::Runner (SystemRunner or a test fake)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use ios_sdk_builder::{
//!     BuildRequest, Executor, FixedVersion, PlanSpec, RunConfig, SystemRunner,
//! };
//!
//! let mut request = BuildRequest {
//!     output_dir: Some("/tmp/sdk".into()),
//!     ..Default::default()
//! };
//! request.defines.insert("FOO", "1")?;
//!
//! let config = RunConfig::new("/src/opencv/OpenCV-iOS");
//! let runner = SystemRunner::default();
//! let executor = Executor::new(config, &runner);
//! let report = executor.build(
//!     &PlanSpec::default(),
//!     &request,
//!     &FixedVersion("2.4.9".into()),
//! )?;
//! println!("SDK in {}", report.sdk_dir.display());
//! # Ok::<(), ios_sdk_builder::BuildError>(())
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod plan;
pub mod preflight;
pub mod process;
pub mod toolchain;
pub mod version;
pub mod workspace;

pub use config::RunConfig;
pub use error::{BuildError, Result};
pub use executor::{BuildReport, Executor, StagedLibrary};
pub use plan::{
    ArchitectureSpec, BuildPlan, BuildRequest, BuildTarget, FixedVersion, PlanSpec,
    PreprocessorFlags, ResolvedBuild, VersionOracle,
};
pub use process::{CommandOutput, Invocation, Runner, SystemRunner};
