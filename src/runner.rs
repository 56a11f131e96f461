//! Process runner: spawn one external command and capture what it produced.
//!
//! Commands come in two shapes that are never conflated:
//!
//! - [`Command::Argv`]: program plus arguments, executed directly. Shell
//!   metacharacters inside an argument are passed through literally.
//! - [`Command::Shell`]: a single string interpreted by `sh -c`.
//!
//! A non-zero exit status is part of the [`Output`], not an error.
//! Whether a failure is fatal is the caller's decision.

use std::ffi::OsString;
use std::fmt;
use std::io::{self, Write};
use std::process::{self, ExitStatus, Stdio};
use std::thread;

use tracing::debug;

/// Errors that prevent a command from running to completion.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write input to `{command}`: {source}")]
    Stdin {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to collect output of `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// An external command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Program followed by its arguments. No shell is involved.
    Argv(Vec<OsString>),

    /// A command line handed to `sh -c`.
    Shell(String),
}

impl Command {
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self::Argv(args.into_iter().map(Into::into).collect())
    }

    /// Builds the `std::process::Command` this variant resolves to.
    fn to_process(&self) -> Result<process::Command, RunError> {
        match self {
            Self::Argv(args) => {
                let (program, rest) = args.split_first().ok_or(RunError::EmptyCommand)?;
                let mut cmd = process::Command::new(program);
                cmd.args(rest);
                Ok(cmd)
            }
            Self::Shell(line) => {
                if line.trim().is_empty() {
                    return Err(RunError::EmptyCommand);
                }
                let mut cmd = process::Command::new("sh");
                cmd.arg("-c").arg(line);
                Ok(cmd)
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argv(args) => {
                let parts: Vec<_> = args.iter().map(|a| a.to_string_lossy()).collect();
                write!(f, "{}", parts.join(" "))
            }
            Self::Shell(line) => write!(f, "{line}"),
        }
    }
}

/// What a finished child process produced.
#[derive(Debug, Clone)]
pub struct Output {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
}

impl Output {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Lossy UTF-8 view of stderr, for error messages.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs `command` to completion.
///
/// With `stdin`, the bytes are written to the child's input in full and the
/// pipe is closed. A child that exits without reading all of it is fine;
/// any other write failure is an error. Without `stdin`, the child reads
/// from the null device. stdout and stderr are captured separately.
pub fn run(command: &Command, stdin: Option<&[u8]>) -> Result<Output, RunError> {
    let mut cmd = command.to_process()?;
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    debug!(%command, "spawning");
    let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
        command: command.to_string(),
        source,
    })?;

    // stdin is written on its own thread: the child may fill its stdout pipe
    // before it drains stdin.
    let pipe = child.stdin.take();
    let (output, written) = thread::scope(|scope| {
        let writer = match (pipe, stdin) {
            (Some(pipe), Some(bytes)) => Some(scope.spawn(move || feed(pipe, bytes))),
            _ => None,
        };
        let output = child.wait_with_output();
        let written = writer.map_or(Ok(()), |w| {
            w.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        });
        (output, written)
    });

    let output = output.map_err(|source| RunError::Wait {
        command: command.to_string(),
        source,
    })?;
    written.map_err(|source| RunError::Stdin {
        command: command.to_string(),
        source,
    })?;

    debug!(%command, status = %output.status, "finished");
    Ok(Output {
        stdout: output.stdout,
        stderr: output.stderr,
        status: output.status,
    })
}

/// Writes all of `bytes` and closes `pipe`. A reader that went away early
/// is not a failure.
fn feed<W: Write>(mut pipe: W, bytes: &[u8]) -> io::Result<()> {
    match pipe.write_all(bytes) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("child closed stdin early");
            Ok(())
        }
        result => result,
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn argv_captures_stdout() {
        let out = run(&Command::argv(["echo", "hello"]), None).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, b"hello\n");
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn argv_does_not_expand_shell_syntax() {
        let out = run(&Command::argv(["echo", "$HOME | wc"]), None).unwrap();
        assert_eq!(out.stdout, b"$HOME | wc\n");
    }

    #[test]
    fn shell_interprets_pipes() {
        let out = run(&Command::Shell("printf 'a\\nb\\n' | wc -l".into()), None).unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "2");
    }

    #[test]
    fn streams_are_kept_separate() {
        let out = run(&Command::Shell("echo out; echo err >&2".into()), None).unwrap();
        assert_eq!(out.stdout, b"out\n");
        assert_eq!(out.stderr, b"err\n");
    }

    #[test]
    fn stdin_is_fed_in_full() {
        let input = "line\n".repeat(20_000);
        let out = run(&Command::argv(["cat"]), Some(input.as_bytes())).unwrap();
        assert_eq!(out.stdout.len(), input.len());
    }

    #[test]
    fn child_ignoring_stdin_is_not_an_error() {
        let input = "line\n".repeat(100_000);
        let out = run(&Command::Shell("exit 0".into()), Some(input.as_bytes())).unwrap();
        assert!(out.success());
    }

    #[test]
    fn stdin_is_null_when_not_supplied() {
        let out = run(&Command::argv(["cat"]), None).unwrap();
        assert!(out.success());
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn nonzero_exit_is_not_an_error() {
        let out = run(&Command::Shell("echo boom >&2; exit 3".into()), None).unwrap();
        assert!(!out.success());
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stderr_lossy(), "boom\n");
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = run(&Command::argv(["definitely-not-a-real-program-kiln"]), None).unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
    }

    #[test]
    fn empty_commands_are_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            run(&Command::argv(empty), None).unwrap_err(),
            RunError::EmptyCommand
        ));
        assert!(matches!(
            run(&Command::Shell("  ".into()), None).unwrap_err(),
            RunError::EmptyCommand
        ));
    }

    #[test]
    fn display_joins_argv() {
        let cmd = Command::argv(["nasm", "-f", "elf64", "x.asm"]);
        assert_eq!(cmd.to_string(), "nasm -f elf64 x.asm");
    }
}
