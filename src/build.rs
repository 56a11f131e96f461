//! Build orchestration: compiler, program, assembler, linker.
//!
//! Steps run strictly in order and every failure is fatal:
//!
//! 1. compile the compiler sources into the compiler binary (memoized);
//! 2. feed the program source through the compiler, saving its stdout as
//!    assembly (always runs);
//! 3. assemble into an object file;
//! 4. link into an executable.
//!
//! Each step records its artifact in a [`BuildContext`] under a fixed target
//! name, and later steps read their input from there.

mod fingerprint;
mod memo;

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tracing::debug;

use crate::config::{Config, ConfigError, StepConfig};
use crate::model::{BuildAction, Color};
use crate::runner::{self, Command, RunError};
use crate::storage::{Storage, StorageError};

pub use memo::memoize;

/// Target name of the compiler binary.
pub const COMPILER: &str = "compiler";
/// Target name of the program's assembly.
pub const ASM: &str = "asm";
/// Target name of the assembled object file.
pub const OBJECT: &str = "object";
/// Target name of the linked executable.
pub const EXECUTABLE: &str = "executable";

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing input: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("{label} failed ({status}){}", stderr_suffix(.stderr))]
    Failed {
        label: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("no `{0}` target has been built")]
    UnknownTarget(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{stderr}")
    }
}

/// Artifacts produced so far in this run, by target name.
#[derive(Debug, Default)]
pub struct BuildContext {
    targets: BTreeMap<String, PathBuf>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: &str, path: PathBuf) {
        self.targets.insert(target.to_string(), path);
    }

    pub fn get(&self, target: &str) -> Result<&Path, BuildError> {
        self.targets
            .get(target)
            .map(PathBuf::as_path)
            .ok_or_else(|| BuildError::UnknownTarget(target.to_string()))
    }
}

/// Step 1: build the compiler binary, skipping the work when its sources
/// are unchanged.
pub fn build_compiler(
    config: &Config,
    storage: &Storage,
    ctx: &mut BuildContext,
) -> Result<PathBuf, BuildError> {
    let inputs = config.compiler_sources()?;
    let output = config.artifact(&config.compiler.output);
    let command = config.compiler.command.render(&inputs, &output)?;
    let action = BuildAction {
        label: config.compiler.label.clone(),
        description: describe(&inputs, &output),
        inputs,
        output,
        command,
        color: Color::Yellow,
    };

    let compiler = memoize(storage, &action, |action| {
        announce(action);
        execute(action, None)?;
        Ok(action.output.clone())
    })?;
    ctx.insert(COMPILER, compiler.clone());
    Ok(compiler)
}

/// Step 2: pipe the program source through the compiler and write what it
/// prints to the assembly file. Never memoized.
///
/// Anything the compiler prints on stderr is passed through.
pub fn emit_program(config: &Config, ctx: &mut BuildContext) -> Result<PathBuf, BuildError> {
    let compiler = ctx.get(COMPILER)?.to_path_buf();
    let source = config.program.source.clone();
    let output = config.artifact(&config.program.output);
    let action = BuildAction {
        label: tool_name(&compiler),
        description: describe(std::slice::from_ref(&source), &output),
        inputs: vec![source.clone()],
        output,
        command: Command::argv([compiler]),
        color: Color::Cyan,
    };

    let program = read_input(&source)?;
    announce(&action);
    let out = execute(&action, Some(program.as_slice()))?;
    if !out.stderr.is_empty() {
        // Best effort: a closed stderr shouldn't fail the build.
        let _ = io::stderr().write_all(&out.stderr);
    }
    write_output(&action.output, &out.stdout)?;

    ctx.insert(ASM, action.output.clone());
    Ok(action.output)
}

/// Step 3: assemble the emitted assembly into an object file.
pub fn assemble(config: &Config, ctx: &mut BuildContext) -> Result<PathBuf, BuildError> {
    let asm = ctx.get(ASM)?.to_path_buf();
    let object = run_step(config, &config.assembler, asm, Color::Magenta)?;
    ctx.insert(OBJECT, object.clone());
    Ok(object)
}

/// Step 4: link the object file into the final executable.
pub fn link(config: &Config, ctx: &mut BuildContext) -> Result<PathBuf, BuildError> {
    let object = ctx.get(OBJECT)?.to_path_buf();
    let executable = run_step(config, &config.linker, object, Color::Green)?;
    ctx.insert(EXECUTABLE, executable.clone());
    Ok(executable)
}

/// Runs all four steps and returns the context holding every artifact.
pub fn build_all(config: &Config, storage: &Storage) -> Result<BuildContext, BuildError> {
    let mut ctx = BuildContext::new();
    build_compiler(config, storage, &mut ctx)?;
    emit_program(config, &mut ctx)?;
    assemble(config, &mut ctx)?;
    link(config, &mut ctx)?;
    Ok(ctx)
}

fn run_step(
    config: &Config,
    step: &StepConfig,
    input: PathBuf,
    color: Color,
) -> Result<PathBuf, BuildError> {
    let output = config.artifact(&step.output);
    let inputs = vec![input];
    let command = step.command.render(&inputs, &output)?;
    let action = BuildAction {
        label: step.label.clone(),
        description: describe(&inputs, &output),
        inputs,
        output,
        command,
        color,
    };
    announce(&action);
    execute(&action, None)?;
    Ok(action.output)
}

/// Runs the action's command and turns a non-zero exit into an error.
fn execute(action: &BuildAction, stdin: Option<&[u8]>) -> Result<runner::Output, BuildError> {
    if let Some(parent) = action.output.parent() {
        fs::create_dir_all(parent).map_err(|source| BuildError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    debug!(command = %action.command, "executing");
    let out = runner::run(&action.command, stdin)?;
    if !out.success() {
        return Err(BuildError::Failed {
            label: action.label.clone(),
            status: out.status,
            stderr: out.stderr_lossy(),
        });
    }
    Ok(out)
}

fn announce(action: &BuildAction) {
    let stderr = io::stderr();
    let colored = stderr.is_terminal();
    let _ = writeln!(stderr.lock(), "{}", action.banner(colored));
}

fn describe(inputs: &[PathBuf], output: &Path) -> String {
    let inputs: Vec<_> = inputs.iter().map(|p| p.display().to_string()).collect();
    format!("{} -> {}", inputs.join(" "), output.display())
}

fn tool_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn read_input(path: &Path) -> Result<Vec<u8>, BuildError> {
    fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => BuildError::MissingInput(path.to_path_buf()),
        _ => BuildError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    fs::write(path, bytes).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })
}
