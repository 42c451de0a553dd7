//! Delivery and command-execution seams.
//!
//! # Responsibility
//! - Define the `deliver(title, body)` capability the generate pass calls.
//! - Run command-modifier rules and capture their output.
//!
//! # Invariants
//! - No retries here; a failure is reported once and the caller decides.
//! - Commands run through `sh -c`, one at a time, blocking.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

/// Environment variable carrying the title for `CommandDelivery`.
pub const TITLE_ENV_VAR: &str = "REMIND_TITLE";

/// Hands one reminder to the outside world.
pub trait Deliver {
    fn deliver(&self, title: &str, body: &str) -> Result<(), DeliveryError>;
}

/// The delivery capability reported a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    pub message: String,
}

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for DeliveryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "delivery failed: {}", self.message)
    }
}

impl Error for DeliveryError {}

/// Runs a command-modifier rule and returns its standard output.
pub trait CommandRunner {
    fn run(&self, command: &str) -> Result<String, CommandError>;
}

/// A command could not be started or exited unsuccessfully.
#[derive(Debug)]
pub enum CommandError {
    Spawn {
        command: String,
        source: std::io::Error,
    },
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn { command, source } => {
                write!(f, "could not start `{command}`: {source}")
            }
            Self::Failed {
                command,
                code,
                stderr,
            } => {
                match code {
                    Some(code) => write!(f, "`{command}` exited with status {code}")?,
                    None => write!(f, "`{command}` was terminated by a signal")?,
                }
                if !stderr.trim().is_empty() {
                    write!(f, ": {}", stderr.trim())?;
                }
                Ok(())
            }
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::Failed { .. } => None,
        }
    }
}

/// Runs commands with `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn run(&self, command: &str) -> Result<String, CommandError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                command: command.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

/// Delivers by running a configured shell command.
///
/// The title is passed in `REMIND_TITLE` and the body on stdin, so a
/// command such as `mail -s "$REMIND_TITLE" me@example.com` works as is.
#[derive(Debug, Clone)]
pub struct CommandDelivery {
    command: String,
}

impl CommandDelivery {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Deliver for CommandDelivery {
    fn deliver(&self, title: &str, body: &str) -> Result<(), DeliveryError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env(TITLE_ENV_VAR, title)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| DeliveryError::new(format!("could not start delivery command: {err}")))?;

        // A command may exit without reading its body; the child is still reaped.
        let written = match child.stdin.take() {
            Some(mut stdin) => match stdin.write_all(body.as_bytes()) {
                Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
                result => result,
            },
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(|err| DeliveryError::new(format!("delivery command failed: {err}")))?;
        if !output.status.success() {
            return Err(DeliveryError::new(format!(
                "delivery command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        written.map_err(|err| DeliveryError::new(format!("could not write body: {err}")))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::{CommandDelivery, CommandError, CommandRunner, Deliver, ShellCommandRunner};

    #[test]
    fn shell_runner_captures_stdout() {
        let output = ShellCommandRunner.run("printf 'disk ok\\n'").unwrap();
        assert_eq!(output, "disk ok");
    }

    #[test]
    fn shell_runner_reports_exit_status() {
        let err = ShellCommandRunner.run("echo nope >&2; exit 3").unwrap_err();
        match err {
            CommandError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn command_delivery_passes_title_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sent.txt");
        let delivery = CommandDelivery::new(format!(
            "{{ echo \"$REMIND_TITLE\"; cat; }} > '{}'",
            out.display()
        ));
        delivery.deliver("call mom", "about sunday").unwrap();
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "call mom\nabout sunday"
        );

        assert!(CommandDelivery::new("exit 1").deliver("x", "").is_err());
    }

    #[test]
    fn command_that_ignores_the_body_still_delivers() {
        let body = "a".repeat(1 << 20);
        CommandDelivery::new("true").deliver("x", &body).unwrap();

        let err = CommandDelivery::new("exit 4").deliver("x", &body).unwrap_err();
        assert!(err.to_string().contains("exited with"), "{err}");
    }
}
