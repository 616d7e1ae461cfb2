//! Temporary work directory and SDK output tree.
//!
//! The work directory is a scoped resource: it is removed when the [`WorkDir`]
//! is dropped or finished, on success and failure alike, unless the run asked
//! to keep it. Removal failures are only logged.

use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{BuildError, IoContext, Result};

const WORKDIR_PREFIX: &str = "ios-sdk-build-";

/// Directory inside the SDK that receives the libraries.
pub const LIBRARY_DIR: &str = "OpenCV";

/// Fresh temporary root for one run's intermediate artifacts.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
    keep: bool,
}

impl WorkDir {
    /// Create a uniquely named root and check that it is writable.
    pub fn create(keep: bool) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .disable_cleanup(keep)
            .tempdir()
            .io_context(|| "creating temporary work directory".to_string())?;
        ensure_writable(dir.path())?;
        Ok(Self { dir, keep })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create the directory for a new step. Parents are created as needed;
    /// the step directory itself must not exist yet.
    pub fn create_step_dir(&self, dir: &Path) -> Result<PathBuf> {
        if !dir.starts_with(self.path()) {
            return Err(BuildError::configuration(format!(
                "step directory '{}' is outside the work directory '{}'",
                dir.display(),
                self.path().display()
            )));
        }
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)
                .io_context(|| format!("creating work directory '{}'", parent.display()))?;
        }
        fs::create_dir(dir)
            .io_context(|| format!("creating step directory '{}'", dir.display()))?;
        Ok(dir.to_path_buf())
    }

    /// Release the work directory. Returns its path when it was kept.
    pub fn finish(self) -> Option<PathBuf> {
        if self.keep {
            let path = self.dir.path().to_path_buf();
            info!(path = %path.display(), "keeping work directory");
            return Some(path);
        }
        let path = self.dir.path().to_path_buf();
        if let Err(err) = self.dir.close() {
            warn!(path = %path.display(), error = %err, "failed to remove work directory");
        }
        None
    }
}

fn ensure_writable(dir: &Path) -> Result<()> {
    tempfile::tempfile_in(dir)
        .map(drop)
        .io_context(|| format!("work directory '{}' is not writable", dir.display()))
}

/// Destination tree `<output_root>/<name>/OpenCV/`.
#[derive(Debug, Clone)]
pub struct OutputSdk {
    root: PathBuf,
    library_dir: PathBuf,
}

impl OutputSdk {
    /// Recreate the SDK directory from scratch, removing any previous run's
    /// output with the same name.
    pub fn prepare(output_root: &Path, name: &str) -> Result<Self> {
        let root = output_root.join(name);
        if root.exists() {
            info!(path = %root.display(), "removing previous SDK");
            fs::remove_dir_all(&root)
                .io_context(|| format!("removing existing SDK directory '{}'", root.display()))?;
        }
        let library_dir = root.join(LIBRARY_DIR);
        fs::create_dir_all(&library_dir)
            .io_context(|| format!("creating SDK directory '{}'", library_dir.display()))?;
        Ok(Self { root, library_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy a finished library into the SDK, keeping permissions and times.
    ///
    /// The copy lands under a hidden temporary name and is renamed into place,
    /// so the SDK never holds a half-written library.
    pub fn stage(&self, library: &Path) -> Result<PathBuf> {
        let name = library.file_name().ok_or_else(|| {
            BuildError::configuration(format!(
                "library path '{}' has no file name",
                library.display()
            ))
        })?;
        let dest = self.library_dir.join(name);
        let partial = self
            .library_dir
            .join(format!(".{}.partial", name.to_string_lossy()));

        let result = copy_preserving(library, &partial).and_then(|()| {
            fs::rename(&partial, &dest).io_context(|| {
                format!(
                    "moving '{}' -> '{}'",
                    partial.display(),
                    dest.display()
                )
            })
        });
        if result.is_err() {
            let _ = fs::remove_file(&partial);
        }
        result.map(|()| dest)
    }

    /// Every regular file under the SDK root, sorted.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| BuildError::Io {
                context: format!("walking SDK directory '{}'", self.root.display()),
                source: e.into(),
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

fn copy_preserving(src: &Path, dst: &Path) -> Result<()> {
    let metadata = fs::metadata(src)
        .io_context(|| format!("reading metadata of '{}'", src.display()))?;
    fs::copy(src, dst)
        .io_context(|| format!("copying '{}' -> '{}'", src.display(), dst.display()))?;

    let mut times = FileTimes::new();
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    File::open(dst)
        .and_then(|file| file.set_times(times))
        .io_context(|| format!("setting timestamps on '{}'", dst.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_workdir_removed_on_finish() {
        let work = WorkDir::create(false).unwrap();
        let path = work.path().to_path_buf();
        assert!(path.is_dir());
        assert_eq!(work.finish(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_workdir_removed_on_drop() {
        let work = WorkDir::create(false).unwrap();
        let path = work.path().to_path_buf();
        drop(work);
        assert!(!path.exists());
    }

    #[test]
    fn test_workdir_kept_when_requested() {
        let work = WorkDir::create(true).unwrap();
        let kept = work.finish().unwrap();
        assert!(kept.is_dir());
        fs::remove_dir_all(kept).unwrap();
    }

    #[test]
    fn test_workdirs_are_unique() {
        let a = WorkDir::create(false).unwrap();
        let b = WorkDir::create(false).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_step_dir_created_once() {
        let work = WorkDir::create(false).unwrap();
        let step = work.path().join("Release/core/core/Archive");
        assert_eq!(work.create_step_dir(&step).unwrap(), step);
        assert!(step.is_dir());
        assert!(work.create_step_dir(&step).is_err());
    }

    #[test]
    fn test_step_dir_outside_root_rejected() {
        let work = WorkDir::create(false).unwrap();
        let outside = tempfile::TempDir::new().unwrap();
        assert!(work.create_step_dir(&outside.path().join("x")).is_err());
    }

    #[test]
    fn test_prepare_replaces_previous_sdk() {
        let out = tempfile::TempDir::new().unwrap();
        let stale = out.path().join("opencv_ios_sdk_1.0/OpenCV/libstale.a");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"old").unwrap();
        fs::write(out.path().join("opencv_ios_sdk_1.0/README"), b"old").unwrap();

        let sdk = OutputSdk::prepare(out.path(), "opencv_ios_sdk_1.0").unwrap();
        assert!(sdk.library_dir.is_dir());
        assert!(sdk.files().unwrap().is_empty());
        assert_eq!(sdk.root(), out.path().join("opencv_ios_sdk_1.0"));
    }

    #[test]
    fn test_prepare_creates_missing_output_root() {
        let out = tempfile::TempDir::new().unwrap();
        let root = out.path().join("not/yet/there");
        let sdk = OutputSdk::prepare(&root, "opencv_ios_sdk_1.0").unwrap();
        assert!(sdk.library_dir.ends_with("opencv_ios_sdk_1.0/OpenCV"));
        assert!(sdk.library_dir.is_dir());
    }

    #[test]
    fn test_stage_preserves_mode_and_mtime() {
        let out = tempfile::TempDir::new().unwrap();
        let src_dir = tempfile::TempDir::new().unwrap();
        let src = src_dir.path().join("libcore.a");
        fs::write(&src, b"!<arch>\nfat").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o640)).unwrap();
        let old = SystemTime::now() - Duration::from_secs(86_400);
        File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let sdk = OutputSdk::prepare(out.path(), "sdk").unwrap();
        let staged = sdk.stage(&src).unwrap();

        assert_eq!(staged, sdk.library_dir.join("libcore.a"));
        assert_eq!(fs::read(&staged).unwrap(), b"!<arch>\nfat");
        let meta = fs::metadata(&staged).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o640);
        assert_eq!(
            meta.modified().unwrap(),
            fs::metadata(&src).unwrap().modified().unwrap()
        );
        assert_eq!(sdk.files().unwrap(), vec![staged]);
    }

    #[test]
    fn test_stage_missing_source_leaves_nothing() {
        let out = tempfile::TempDir::new().unwrap();
        let sdk = OutputSdk::prepare(out.path(), "sdk").unwrap();
        assert!(sdk.stage(&out.path().join("libmissing.a")).is_err());
        assert!(sdk.files().unwrap().is_empty());
    }
}
