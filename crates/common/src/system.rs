//! External command execution
//!
//! Everything that shells out (`wg`, `systemctl`, `wg-quick`, `sysctl`, `ip`)
//! goes through [`System`] so orchestration can be driven by a fake in tests.

use crate::{Error, Result};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Command runner capability
#[async_trait]
pub trait System: Send + Sync {
    /// Whether the current process runs with root privileges
    fn is_root(&self) -> bool;

    /// Whether `name` resolves to an executable on `PATH`
    fn has_command(&self, name: &str) -> bool;

    /// Run a command, failing on a non-zero exit
    async fn run(&self, program: &str, args: &[&str]) -> Result<()>;

    /// Run a command and return its trimmed stdout
    async fn output(&self, program: &str, args: &[&str]) -> Result<String>;

    /// Like [`System::output`], feeding `input` on stdin
    async fn output_with_input(&self, input: &str, program: &str, args: &[&str]) -> Result<String>;
}

/// [`System`] backed by real processes
///
/// Children are killed when the returned future is dropped, so cancelling
/// the caller's task cancels the command.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecSystem;

impl ExecSystem {
    fn command(program: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn check(program: &str, args: &[&str], output: Output) -> Result<String> {
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = match stderr.trim() {
            "" => output.status.to_string(),
            msg => format!("{}: {}", output.status, msg),
        };
        Err(Error::CommandFailed {
            command: command_line(program, args),
            detail,
        })
    }
}

#[async_trait]
impl System for ExecSystem {
    fn is_root(&self) -> bool {
        #[cfg(unix)]
        {
            nix::unistd::geteuid().is_root()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    fn has_command(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        self.output(program, args).await.map(|_| ())
    }

    async fn output(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!("Running {}", command_line(program, args));
        let output = Self::command(program, args).output().await?;
        Self::check(program, args, output)
    }

    async fn output_with_input(&self, input: &str, program: &str, args: &[&str]) -> Result<String> {
        debug!("Running {} with stdin", command_line(program, args));
        let mut child = Self::command(program, args).stdin(Stdio::piped()).spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await?;
            // closing stdin lets the child see EOF
            drop(stdin);
        }
        let output = child.wait_with_output().await?;
        Self::check(program, args, output)
    }
}

/// Space-joined command line for reports and errors
pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        assert_eq!(command_line("wg", &[]), "wg");
        assert_eq!(
            command_line("systemctl", &["restart", "wg-quick@bp-home"]),
            "systemctl restart wg-quick@bp-home"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_system_output() {
        let sys = ExecSystem;
        assert!(sys.has_command("sh"));
        assert!(!sys.has_command("definitely-not-a-real-command-bp"));

        let out = sys.output("sh", &["-c", "echo '  hello  '"]).await.unwrap();
        assert_eq!(out, "hello");

        let out = sys.output_with_input("from stdin\n", "cat", &[]).await.unwrap();
        assert_eq!(out, "from stdin");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_system_failure_carries_stderr() {
        let err = ExecSystem
            .run("sh", &["-c", "echo boom >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            Error::CommandFailed { command, detail } => {
                assert_eq!(command, "sh -c echo boom >&2; exit 3");
                assert!(detail.contains("boom"), "{detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
