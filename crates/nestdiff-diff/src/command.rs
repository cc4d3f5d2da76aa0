//! Running external analysis tools.
//!
//! Leaf comparators that shell out (e.g. `nm -s` for archive symbol tables)
//! go through [`ToolCommand`], which turns "not installed" and non-zero exits
//! into structured [`DiffError`]s and kills the child when the run is aborted.

use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use nestdiff_types::AbortSignal;
use tracing::debug;

use crate::error::{DiffError, DiffResult};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Longest stderr excerpt kept in a [`DiffError::ToolFailed`].
const STDERR_EXCERPT: usize = 512;

/// A blocking invocation of an external program.
#[derive(Clone, Debug)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
}

impl ToolCommand {
    /// Create a command for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// The program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Program and arguments joined for display.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }

    /// Run to completion and return stdout.
    ///
    /// Polls `abort` while the child runs; when it fires the child is killed
    /// and [`DiffError::Aborted`] is returned.
    pub fn run(&self, abort: &AbortSignal) -> DiffResult<Vec<u8>> {
        if abort.is_triggered() {
            return Err(DiffError::Aborted);
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => DiffError::ToolMissing {
                    tool: self.program.clone(),
                },
                _ => DiffError::Io(e),
            })?;
        debug!(command = %self.display(), pid = child.id(), "spawned external tool");

        // Drain both pipes on their own threads so a chatty child never blocks.
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = loop {
            if abort.is_triggered() {
                kill(&mut child);
                return Err(DiffError::Aborted);
            }
            match child.try_wait()? {
                Some(status) => break status,
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let stdout = join_reader(stdout)?;
        let stderr = join_reader(stderr)?;

        if !status.success() {
            let mut message = String::from_utf8_lossy(&stderr).trim().to_string();
            if message.len() > STDERR_EXCERPT {
                let mut cut = STDERR_EXCERPT;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(DiffError::ToolFailed {
                tool: self.program.clone(),
                status: status.code(),
                stderr: message,
            });
        }

        Ok(stdout)
    }
}

type ReaderHandle = Option<thread::JoinHandle<io::Result<Vec<u8>>>>;

fn spawn_reader<R>(pipe: Option<R>) -> ReaderHandle
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_reader(handle: ReaderHandle) -> DiffResult<Vec<u8>> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| DiffError::Io(io::Error::other("pipe reader panicked")))?
            .map_err(DiffError::Io),
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "failed to kill aborted tool");
    }
    let _ = child.wait();
}
