//! `xcodebuild` invocation descriptors.
//!
//! All commands go through `xcrun` so the active developer directory decides
//! which Xcode runs.

use std::path::Path;

use crate::plan::{ArchitectureSpec, BuildTarget, PreprocessorFlags};
use crate::process::Invocation;

/// Extra compiler flags for secondary architecture builds.
pub const SECONDARY_CFLAGS: &str = "-fembed-bitcode";

fn base(target: &BuildTarget, variant: &str) -> Invocation {
    Invocation::new("xcrun").args([
        "xcodebuild",
        "-scheme",
        target.scheme.as_str(),
        "-target",
        target.target.as_str(),
        "-configuration",
        variant,
    ])
}

/// Settings that restrict a build to one secondary architecture.
fn secondary_base(target: &BuildTarget, arch: &ArchitectureSpec, variant: &str) -> Invocation {
    Invocation::new("xcrun")
        .args([
            "xcodebuild".to_string(),
            format!("VALID_ARCHS={}", arch.arch),
            format!("OTHER_CFLAGS={SECONDARY_CFLAGS}"),
        ])
        .args([
            "-scheme",
            target.scheme.as_str(),
            "-target",
            target.target.as_str(),
            "-arch",
            arch.arch.as_str(),
            "-sdk",
            arch.sdk.as_str(),
            "-configuration",
            variant,
        ])
}

fn build_dir_setting(out_dir: &Path) -> String {
    format!("CONFIGURATION_BUILD_DIR={}", out_dir.display())
}

/// Clean the primary archive configuration.
pub fn clean_archive(target: &BuildTarget, variant: &str, sdk: &str) -> Invocation {
    base(target, variant).args(["-sdk", sdk, "clean"])
}

/// Archive the primary architectures into `out_dir`.
pub fn archive(target: &BuildTarget, variant: &str, sdk: &str, out_dir: &Path) -> Invocation {
    base(target, variant)
        .args(["-sdk", sdk, "archive"])
        .arg(build_dir_setting(out_dir))
}

/// Clean one secondary architecture.
pub fn clean_arch(target: &BuildTarget, arch: &ArchitectureSpec, variant: &str) -> Invocation {
    secondary_base(target, arch, variant).arg("clean")
}

/// Build one secondary architecture into `out_dir`.
///
/// Overrides are appended to the inherited definitions, so `$(value)` is
/// passed through to xcodebuild literally.
pub fn build_arch(
    target: &BuildTarget,
    arch: &ArchitectureSpec,
    variant: &str,
    out_dir: &Path,
    defines: &PreprocessorFlags,
) -> Invocation {
    let inv = secondary_base(target, arch, variant).arg(build_dir_setting(out_dir));
    if defines.is_empty() {
        return inv;
    }
    inv.arg(format!(
        "GCC_PREPROCESSOR_DEFINITIONS=$(value) {}",
        defines.definitions()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> BuildTarget {
        BuildTarget::new("opencv_core", "opencv_core")
    }

    #[test]
    fn test_clean_archive_args() {
        let inv = clean_archive(&core(), "Release", "iphoneos");
        assert_eq!(
            inv.to_string(),
            "xcrun xcodebuild -scheme opencv_core -target opencv_core -configuration Release -sdk iphoneos clean"
        );
    }

    #[test]
    fn test_archive_writes_to_build_dir() {
        let inv = archive(
            &core(),
            "Release",
            "iphoneos",
            Path::new("/w/Release/c/c/Archive"),
        );
        assert_eq!(
            inv.setting("CONFIGURATION_BUILD_DIR"),
            Some("/w/Release/c/c/Archive")
        );
        assert!(inv.get_args().iter().any(|a| a == "archive"));
        assert_eq!(inv.setting("GCC_PREPROCESSOR_DEFINITIONS"), None);
    }

    #[test]
    fn test_build_arch_restricts_architecture() {
        let arch = ArchitectureSpec::new("x86_64", "iphonesimulator");
        let mut defines = PreprocessorFlags::new();
        defines.insert("FOO", "1").unwrap();
        defines.insert("BAR", "2").unwrap();

        let inv = build_arch(&core(), &arch, "Release", Path::new("/w/x86_64"), &defines);
        assert_eq!(inv.setting("VALID_ARCHS"), Some("x86_64"));
        assert_eq!(inv.setting("OTHER_CFLAGS"), Some("-fembed-bitcode"));
        assert_eq!(inv.flag_value("-arch"), Some("x86_64"));
        assert_eq!(inv.flag_value("-sdk"), Some("iphonesimulator"));
        assert_eq!(inv.setting("CONFIGURATION_BUILD_DIR"), Some("/w/x86_64"));
        assert_eq!(
            inv.setting("GCC_PREPROCESSOR_DEFINITIONS"),
            Some("$(value) BAR=2 FOO=1")
        );
    }

    #[test]
    fn test_build_arch_without_defines() {
        let arch = ArchitectureSpec::new("i386", "iphonesimulator");
        let none = PreprocessorFlags::new();
        let inv = build_arch(&core(), &arch, "Release", Path::new("/w/i386"), &none);
        assert_eq!(inv.setting("GCC_PREPROCESSOR_DEFINITIONS"), None);
    }

    #[test]
    fn test_clean_arch_matches_build_settings() {
        let arch = ArchitectureSpec::new("i386", "iphonesimulator");
        let inv = clean_arch(&core(), &arch, "Debug");
        assert_eq!(inv.get_args().last().map(String::as_str), Some("clean"));
        assert_eq!(inv.flag_value("-configuration"), Some("Debug"));
        assert_eq!(inv.setting("VALID_ARCHS"), Some("i386"));
    }
}
