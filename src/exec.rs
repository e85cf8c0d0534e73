//! External command execution.
//!
//! Every interaction with git, gpg and the transfer tools goes through
//! [`CommandExecutor`] so that stages can be exercised against scripted
//! responses in tests.

use crate::error::{ReleaseError, Result};
use log::debug;
use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command, including a [`std::io::ErrorKind::TimedOut`] error when the
    /// executor enforces a timeout.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use relpipe::exec::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("git", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), relpipe::error::ReleaseError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;

    /// Runs a command that may block on the network.
    ///
    /// Executors that enforce a timeout apply it here; the default simply
    /// delegates to [`CommandExecutor::run`].
    ///
    /// # Errors
    ///
    /// As for [`CommandExecutor::run`].
    fn run_networked(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        self.run(cmd, args)
    }
}

/// Executes commands on the host system.
///
/// Standard input is inherited so that tools such as gpg can prompt for a
/// passphrase; standard output and error are captured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor {
    network_timeout: Option<Duration>,
}

impl SystemCommandExecutor {
    /// Create an executor that kills networked commands after `timeout`.
    #[must_use]
    pub const fn with_network_timeout(timeout: Option<Duration>) -> Self {
        Self {
            network_timeout: timeout,
        }
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        debug!("running {cmd} {}", args.join(" "));
        Command::new(cmd)
            .args(args)
            .stdin(Stdio::inherit())
            .output()
            .map_err(ReleaseError::from)
    }

    fn run_networked(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        match self.network_timeout {
            Some(timeout) => run_with_timeout(cmd, args, timeout),
            None => self.run(cmd, args),
        }
    }
}

/// Runs a command, killing it if it does not finish within `timeout`.
///
/// Output is read on separate threads while the child runs, so a command
/// that fills its pipe buffers still finishes.
fn run_with_timeout(cmd: &str, args: &[&str], timeout: Duration) -> Result<Output> {
    debug!(
        "running {cmd} {} (timeout {}s)",
        args.join(" "),
        timeout.as_secs()
    );
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    match child.wait_timeout(timeout)? {
        Some(status) => Ok(Output {
            status,
            stdout: collect(stdout)?,
            stderr: collect(stderr)?,
        }),
        None => {
            // Best effort: the process may already have exited.
            if child.kill().is_err() {
                debug!("{cmd} exited before it could be killed");
            }
            child.wait()?;
            // Readers are left detached; a grandchild may still hold the pipes.
            Err(ReleaseError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{cmd} timed out after {} seconds", timeout.as_secs()),
            )))
        }
    }
}

/// Reads `pipe` to the end on a background thread.
fn drain<R>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(reader: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| io::Error::other("output reader panicked"))?
}

/// Returns trimmed stderr, falling back to stdout when stderr is empty.
pub(crate) fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{exit_status, failure_output};

    #[test]
    fn failure_message_prefers_stderr() {
        let output = failure_output("fatal: bad revision");
        assert_eq!(failure_message(&output), "fatal: bad revision");
    }

    #[test]
    fn failure_message_falls_back_to_stdout() {
        let output = Output {
            status: exit_status(1),
            stdout: b"  upload rejected \n".to_vec(),
            stderr: Vec::new(),
        };
        assert_eq!(failure_message(&output), "upload rejected");
    }

    #[test]
    fn default_executor_has_no_timeout() {
        let executor = SystemCommandExecutor::default();
        assert!(executor.network_timeout.is_none());
    }

    fn bounded() -> SystemCommandExecutor {
        SystemCommandExecutor::with_network_timeout(Some(Duration::from_secs(30)))
    }

    #[cfg(unix)]
    #[test]
    fn bounded_command_with_large_output_completes() {
        let output = bounded()
            .run_networked("sh", &["-c", "head -c 200000 /dev/zero | tr '\\0' a"])
            .expect("command finishes");
        assert!(output.status.success());
        assert_eq!(output.stdout.len(), 200_000);
        assert!(output.stdout.iter().all(|b| *b == b'a'));
    }

    #[cfg(unix)]
    #[test]
    fn bounded_command_keeps_raw_bytes() {
        let output = bounded()
            .run_networked("sh", &["-c", "printf 'caf\\351'; printf 'warn\\377' >&2"])
            .expect("command finishes");
        assert_eq!(output.stdout, b"caf\xe9");
        assert_eq!(output.stderr, b"warn\xff");
    }

    #[cfg(unix)]
    #[test]
    fn bounded_command_is_killed_after_timeout() {
        let timeout = Some(Duration::from_millis(200));
        let err = SystemCommandExecutor::with_network_timeout(timeout)
            .run_networked("sleep", &["10"])
            .expect_err("timed out");
        assert!(matches!(
            err,
            ReleaseError::Io(ref e) if e.kind() == io::ErrorKind::TimedOut
        ));
    }
}
