//! Work directory layout and per-target artifact bookkeeping.
//!
//! ```text
//! <workdir>/<variant>/<scheme>/<target>/Archive/lib<target>.a
//!                                      /<arch>/lib<target>.a
//!                                      /universal/lib<target>.a
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// One build step's output slot for a target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArtifactSlot {
    /// Output of the primary `archive` action.
    Archive,
    /// Output of one secondary architecture build.
    Arch(String),
    /// The combined, stripped library.
    Universal,
}

impl ArtifactSlot {
    /// Key used in [`ArtifactPaths`].
    pub fn key(&self) -> &str {
        match self {
            Self::Archive => "archive",
            Self::Arch(arch) => arch,
            Self::Universal => "universal",
        }
    }

    /// Directory name under the target's work directory.
    pub fn dir_name(&self) -> &str {
        match self {
            Self::Archive => "Archive",
            Self::Arch(arch) => arch,
            Self::Universal => "universal",
        }
    }
}

/// Work directory of one slot: `<root>/<variant>/<scheme>/<target>/<slot>`.
pub fn slot_dir(
    root: &Path,
    variant: &str,
    scheme: &str,
    target: &str,
    slot: &ArtifactSlot,
) -> PathBuf {
    root.join(variant)
        .join(scheme)
        .join(target)
        .join(slot.dir_name())
}

/// Directories holding each slot's library for one target.
///
/// Filled in as steps complete; the merge step only reads entries recorded
/// here.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPaths {
    dirs: BTreeMap<String, PathBuf>,
}

impl ArtifactPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, slot: &ArtifactSlot, dir: PathBuf) {
        self.dirs.insert(slot.key().to_string(), dir);
    }

    pub fn dir(&self, slot: &ArtifactSlot) -> Option<&Path> {
        self.dirs.get(slot.key()).map(PathBuf::as_path)
    }

    /// Path of `library` in the slot's directory, which must already exist.
    pub fn library(&self, slot: &ArtifactSlot, library: &str) -> Result<PathBuf> {
        let dir = self.dir(slot).ok_or_else(|| {
            BuildError::configuration(format!(
                "no build step recorded output for '{}'",
                slot.key()
            ))
        })?;
        let path = dir.join(library);
        if !path.is_file() {
            return Err(BuildError::ArtifactMissing { path });
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_slot_dir_layout() {
        let root = Path::new("/tmp/work");
        assert_eq!(
            slot_dir(root, "Release", "opencv_core", "opencv_core", &ArtifactSlot::Archive),
            PathBuf::from("/tmp/work/Release/opencv_core/opencv_core/Archive")
        );
        assert_eq!(
            slot_dir(root, "Release", "s", "t", &ArtifactSlot::Arch("x86_64".into())),
            PathBuf::from("/tmp/work/Release/s/t/x86_64")
        );
        assert_eq!(
            slot_dir(root, "Release", "s", "t", &ArtifactSlot::Universal),
            PathBuf::from("/tmp/work/Release/s/t/universal")
        );
    }

    #[test]
    fn test_slot_keys() {
        assert_eq!(ArtifactSlot::Archive.key(), "archive");
        assert_eq!(ArtifactSlot::Universal.key(), "universal");
        assert_eq!(ArtifactSlot::Arch("i386".into()).key(), "i386");
    }

    #[test]
    fn test_library_requires_existing_file() {
        let temp = TempDir::new().unwrap();
        let mut paths = ArtifactPaths::new();
        let slot = ArtifactSlot::Arch("i386".into());
        paths.record(&slot, temp.path().to_path_buf());

        let err = paths.library(&slot, "libcore.a").unwrap_err();
        match err {
            BuildError::ArtifactMissing { path } => {
                assert_eq!(path, temp.path().join("libcore.a"));
            }
            other => panic!("unexpected error: {other}"),
        }

        fs::write(temp.path().join("libcore.a"), b"!<arch>\n").unwrap();
        assert_eq!(
            paths.library(&slot, "libcore.a").unwrap(),
            temp.path().join("libcore.a")
        );
    }

    #[test]
    fn test_library_for_unrecorded_slot_fails() {
        let paths = ArtifactPaths::new();
        assert!(paths.library(&ArtifactSlot::Universal, "libcore.a").is_err());
    }
}
