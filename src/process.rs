//! Structured process invocations and the runner seam that executes them.
//!
//! Every external call the builder makes (`xcodebuild`, `lipo`, `strip`,
//! `git`) is described by an [`Invocation`]: a program, an argument array, extra
//! environment and a working directory. Nothing is ever passed through a shell,
//! so arguments need no quoting.
//!
//! Invocations are executed by a [`Runner`]. [`SystemRunner`] spawns real
//! processes; tests substitute a recording fake.
//!
//! # Example
//!
//! ```rust
//! use ios_sdk_builder::process::Invocation;
//! use std::path::Path;
//!
//! let strip = Invocation::new("xcrun")
//!     .args(["strip", "-S"])
//!     .arg_path(Path::new("/tmp/universal/libopencv_core.a"));
//!
//! assert_eq!(strip.to_string(), "xcrun strip -S /tmp/universal/libopencv_core.a");
//! ```

use std::ffi::OsStr;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, info};

use crate::error::{BuildError, Result};

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument.
    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Value of the first `KEY=value` argument with the given key.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| {
            arg.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
        })
    }

    /// Value following the first occurrence of `flag`.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes invocations. One call blocks until the process exits.
pub trait Runner {
    /// Run the invocation and capture its output, whatever the exit status.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Run the invocation and turn a non-zero exit into [`BuildError::Toolchain`].
    fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let output = self.run(invocation)?;
        if output.is_success() {
            return Ok(output);
        }
        Err(BuildError::Toolchain {
            command: invocation.to_string(),
            code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Spawns real child processes.
///
/// Children stay in this process's process group and inherit its stdin, so a
/// terminal interrupt is delivered to the running tool as well. Output is
/// logged line by line while the tool runs and captured for error reports:
/// at `info` when echoing, `debug` otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner {
    echo: bool,
}

impl SystemRunner {
    pub fn echoing(echo: bool) -> Self {
        Self { echo }
    }
}

impl Runner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!(command = %invocation, "spawning");

        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.get_args())
            .envs(
                invocation
                    .env
                    .iter()
                    .map(|(k, v)| (OsStr::new(k), OsStr::new(v))),
            )
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = invocation.get_current_dir() {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| BuildError::Spawn {
            program: invocation.program().to_string(),
            source,
        })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let echo = self.echo;
        let (stdout, stderr) = thread::scope(|scope| {
            let stderr = scope.spawn(move || relay_lines(stderr_pipe, "stderr", echo));
            let stdout = relay_lines(stdout_pipe, "stdout", echo);
            (stdout, stderr.join().unwrap_or_default())
        });

        let status = child.wait().map_err(|source| BuildError::Io {
            context: format!("waiting for `{}`", invocation.program()),
            source,
        })?;

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Log each line of a child pipe as it arrives and return everything read.
fn relay_lines<R: Read>(pipe: Option<R>, stream: &'static str, echo: bool) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };
    let mut reader = BufReader::new(pipe);
    let mut captured = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let text = line.trim_end_matches(['\n', '\r']);
                if echo {
                    info!(stream, "{text}");
                } else {
                    debug!(stream, "{text}");
                }
                captured.push_str(&line);
            }
        }
    }
    captured
}
