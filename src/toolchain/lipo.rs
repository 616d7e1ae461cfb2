//! Multi-architecture combine (`lipo`) and symbol strip invocations.

use std::path::{Path, PathBuf};

use crate::process::Invocation;

/// One input of a combine. The base input carries no architecture tag and
/// contributes whatever slices it already contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LipoInput {
    pub arch: Option<String>,
    pub path: PathBuf,
}

impl LipoInput {
    pub fn base(path: PathBuf) -> Self {
        Self { arch: None, path }
    }

    pub fn tagged(arch: impl Into<String>, path: PathBuf) -> Self {
        Self {
            arch: Some(arch.into()),
            path,
        }
    }
}

/// `xcrun lipo <base> -arch <a> <lib>... -create -output <output>`
pub fn combine(inputs: &[LipoInput], output: &Path) -> Invocation {
    let mut inv = Invocation::new("xcrun").arg("lipo");
    for input in inputs {
        if let Some(arch) = &input.arch {
            inv = inv.args(["-arch", arch.as_str()]);
        }
        inv = inv.arg_path(&input.path);
    }
    inv.arg("-create").arg("-output").arg_path(output)
}

/// `xcrun strip -S <library>`: removes debug symbols in place.
pub fn strip_debug(library: &Path) -> Invocation {
    Invocation::new("xcrun").args(["strip", "-S"]).arg_path(library)
}
