//! Executable lookup and subprocess execution against an explicit PATH.
//!
//! The bin directory has to take precedence over the rest of the PATH for
//! every lookup and every launched tool. Instead of mutating the process
//! environment, [`ToolEnv`] carries the resolved PATH and applies it to each
//! lookup (`which::which_in`) and each [`tokio::process::Command`].

use crate::error::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// PATH and working directory used for tool lookups and subprocesses.
#[derive(Debug, Clone)]
pub struct ToolEnv {
    path: OsString,
    cwd: PathBuf,
}

impl ToolEnv {
    /// Use `path` verbatim as the search path.
    #[must_use]
    pub fn new(path: impl Into<OsString>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cwd: cwd.into(),
        }
    }

    /// Prepend `bin_dir` to `base_path`. Empty entries are dropped.
    pub fn with_bin_dir(bin_dir: &Path, base_path: Option<&OsStr>, cwd: &Path) -> Result<Self> {
        let mut entries = vec![bin_dir.to_path_buf()];
        if let Some(base) = base_path {
            entries.extend(std::env::split_paths(base).filter(|p| !p.as_os_str().is_empty()));
        }
        let path = std::env::join_paths(entries)
            .map_err(|e| Error::config(format!("invalid PATH entry: {e}")))?;
        Ok(Self::new(path, cwd))
    }

    /// Prepend `bin_dir` to the PATH of the current process.
    pub fn from_process(bin_dir: &Path) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let base = std::env::var_os("PATH");
        Self::with_bin_dir(bin_dir, base.as_deref(), &cwd)
    }

    /// The search path.
    #[must_use]
    pub fn path(&self) -> &OsStr {
        &self.path
    }

    /// Resolve an executable name against the search path.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<PathBuf> {
        match which::which_in(name, Some(&self.path), &self.cwd) {
            Ok(found) => Some(found),
            Err(e) => {
                trace!(name, error = %e, "Executable not found in PATH");
                None
            }
        }
    }

    /// Run `program` to completion, capturing stdout and stderr.
    ///
    /// The child is killed if `cancel` fires first.
    pub async fn output<S: AsRef<OsStr>>(
        &self,
        program: &Path,
        args: &[S],
        cancel: &CancellationToken,
    ) -> Result<Output> {
        let shown = program.display().to_string();
        trace!(program = %shown, "Running command");

        let child = Command::new(program)
            .args(args)
            .env("PATH", &self.path)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::command(&shown, e))?;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            output = child.wait_with_output() => output.map_err(|e| Error::command(&shown, e)),
        }
    }

    /// Run `program` and require a zero exit status.
    pub async fn run_checked<S: AsRef<OsStr>>(
        &self,
        program: &Path,
        args: &[S],
        cancel: &CancellationToken,
    ) -> Result<Output> {
        let output = self.output(program, args, cancel).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(Error::CommandFailed {
                program: program.display().to_string(),
                args: join_args(args),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn join_args<S: AsRef<OsStr>>(args: &[S]) -> String {
    args.iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
