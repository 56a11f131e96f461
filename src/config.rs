//! kiln configuration.
//!
//! Loaded from `kiln.toml` in the working directory, or the file named by
//! `--config`. Every field has a default, so a missing `kiln.toml` means the
//! stock layout:
//!
//! ```toml
//! buildroot = "build"
//!
//! [compiler]
//! label = "crystal"
//! sources = ["wit.cr", "wit/*.cr"]
//! output = "wit"
//! command = ["crystal", "build", "-o", "{output}", "{input}"]
//!
//! [program]
//! source = "prog.wit"
//! output = "prog.asm"
//!
//! [assembler]
//! label = "nasm"
//! output = "x.o"
//! command = ["nasm", "-f", "elf64", "{input}", "-o", "{output}"]
//!
//! [linker]
//! label = "ld"
//! output = "x"
//! command = ["ld", "-o", "{output}", "{input}"]
//!
//! [tests]
//! dir = "tests"
//! extension = "wit"
//! ```
//!
//! Outputs are relative to `buildroot`; everything else is relative to the
//! working directory.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::runner::Command;

/// The config file looked up when `--config` is not given.
pub const DEFAULT_FILE: &str = "kiln.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid source pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to expand `{pattern}`: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::GlobError,
    },

    #[error("command template uses {{input}} but the action has no inputs")]
    NoInput,

    #[error("cannot quote `{0}` for the shell")]
    Quote(String),

    #[error("`{{inputs}}` must be a whole argument, found `{0}`")]
    EmbeddedInputs(String),
}

/// kiln configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Directory that receives every build artifact and the memo database.
    pub buildroot: PathBuf,

    pub compiler: CompilerConfig,
    pub program: ProgramConfig,

    #[serde(deserialize_with = "assembler_over_defaults")]
    pub assembler: StepConfig,

    #[serde(deserialize_with = "linker_over_defaults")]
    pub linker: StepConfig,

    pub tests: TestsConfig,
}

/// How to build the compiler binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompilerConfig {
    pub label: String,

    /// Source files or glob patterns. Order is preserved; each pattern's
    /// matches are sorted.
    pub sources: Vec<String>,

    pub output: PathBuf,
    pub command: CommandTemplate,
}

/// The program fed through the compiler by `kiln build` and `kiln assemble`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ProgramConfig {
    pub source: PathBuf,

    /// Where the compiler's stdout (assembly) is written.
    pub output: PathBuf,
}

/// A plain external step: the assembler or the linker.
#[derive(Debug, Clone)]
pub struct StepConfig {
    pub label: String,
    pub output: PathBuf,
    pub command: CommandTemplate,
}

/// A `[assembler]` or `[linker]` table as written; absent keys keep the
/// step's defaults.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StepTable {
    label: Option<String>,
    output: Option<PathBuf>,
    command: Option<CommandTemplate>,
}

impl StepTable {
    fn over(self, defaults: StepConfig) -> StepConfig {
        StepConfig {
            label: self.label.unwrap_or(defaults.label),
            output: self.output.unwrap_or(defaults.output),
            command: self.command.unwrap_or(defaults.command),
        }
    }
}

fn assembler_over_defaults<'de, D: Deserializer<'de>>(d: D) -> Result<StepConfig, D::Error> {
    Ok(StepTable::deserialize(d)?.over(StepConfig::assembler()))
}

fn linker_over_defaults<'de, D: Deserializer<'de>>(d: D) -> Result<StepConfig, D::Error> {
    Ok(StepTable::deserialize(d)?.over(StepConfig::linker()))
}

/// Where golden-transcript fixtures live.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TestsConfig {
    pub dir: PathBuf,

    /// Fixture file extension, without the dot.
    pub extension: String,
}

/// A command with `{input}`, `{inputs}` and `{output}` placeholders.
///
/// A TOML array is an argv command; a TOML string runs through `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandTemplate {
    Argv(Vec<String>),
    Shell(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buildroot: PathBuf::from("build"),
            compiler: CompilerConfig::default(),
            program: ProgramConfig::default(),
            assembler: StepConfig::assembler(),
            linker: StepConfig::linker(),
            tests: TestsConfig::default(),
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            label: "crystal".into(),
            sources: vec!["wit.cr".into(), "wit/*.cr".into()],
            output: PathBuf::from("wit"),
            command: argv(&["crystal", "build", "-o", "{output}", "{input}"]),
        }
    }
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("prog.wit"),
            output: PathBuf::from("prog.asm"),
        }
    }
}

impl StepConfig {
    pub fn assembler() -> Self {
        Self {
            label: "nasm".into(),
            output: PathBuf::from("x.o"),
            command: argv(&["nasm", "-f", "elf64", "{input}", "-o", "{output}"]),
        }
    }

    pub fn linker() -> Self {
        Self {
            label: "ld".into(),
            output: PathBuf::from("x"),
            command: argv(&["ld", "-o", "{output}", "{input}"]),
        }
    }
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("tests"),
            extension: "wit".into(),
        }
    }
}

fn argv(args: &[&str]) -> CommandTemplate {
    CommandTemplate::Argv(args.iter().map(ToString::to_string).collect())
}

impl Config {
    /// Loads the config.
    ///
    /// An explicit path must exist. Without one, `kiln.toml` is read if
    /// present and the defaults are used otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.unwrap_or(Path::new(DEFAULT_FILE));
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if explicit.is_none() && e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolves a build output name to its path under the build root.
    pub fn artifact(&self, name: &Path) -> PathBuf {
        self.buildroot.join(name)
    }

    /// Expands the compiler source list into concrete paths.
    ///
    /// Literal entries are kept even if they don't exist, so the build
    /// reports them as missing inputs. A pattern that matches nothing
    /// contributes nothing.
    pub fn compiler_sources(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let mut sources = Vec::new();
        for entry in &self.compiler.sources {
            if !is_pattern(entry) {
                sources.push(PathBuf::from(entry));
                continue;
            }
            let paths = glob::glob(entry).map_err(|source| ConfigError::Pattern {
                pattern: entry.clone(),
                source,
            })?;
            let mut matched = paths
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| ConfigError::Glob {
                    pattern: entry.clone(),
                    source,
                })?;
            if matched.is_empty() {
                warn!(pattern = %entry, "source pattern matched no files");
            }
            matched.sort();
            sources.extend(matched);
        }
        Ok(sources)
    }
}

fn is_pattern(entry: &str) -> bool {
    entry.contains(['*', '?', '['])
}

impl CommandTemplate {
    /// Substitutes the placeholders and produces a runnable command.
    ///
    /// In argv templates, an argument that is exactly `{inputs}` expands to
    /// one argument per input; `{inputs}` inside a longer argument is
    /// rejected. In shell templates every substituted path is shell-quoted.
    pub fn render(&self, inputs: &[PathBuf], output: &Path) -> Result<Command, ConfigError> {
        let first = inputs.first();
        match self {
            Self::Argv(args) => {
                let mut rendered: Vec<OsString> = Vec::with_capacity(args.len());
                for arg in args {
                    match arg.as_str() {
                        "{inputs}" => rendered.extend(inputs.iter().map(|p| p.clone().into())),
                        "{input}" => rendered.push(first.ok_or(ConfigError::NoInput)?.into()),
                        "{output}" => rendered.push(output.into()),
                        _ => {
                            if arg.contains("{inputs}") {
                                return Err(ConfigError::EmbeddedInputs(arg.clone()));
                            }
                            if arg.contains("{input}") && first.is_none() {
                                return Err(ConfigError::NoInput);
                            }
                            let mut text = arg.replace("{output}", &output.to_string_lossy());
                            if let Some(input) = first {
                                text = text.replace("{input}", &input.to_string_lossy());
                            }
                            rendered.push(text.into());
                        }
                    }
                }
                Ok(Command::Argv(rendered))
            }
            Self::Shell(line) => {
                let mut text = line.clone();
                if text.contains("{inputs}") {
                    let quoted = inputs
                        .iter()
                        .map(|p| quote(p))
                        .collect::<Result<Vec<_>, _>>()?;
                    text = text.replace("{inputs}", &quoted.join(" "));
                }
                if text.contains("{input}") {
                    let input = first.ok_or(ConfigError::NoInput)?;
                    text = text.replace("{input}", &quote(input)?);
                }
                text = text.replace("{output}", &quote(output)?);
                Ok(Command::Shell(text))
            }
        }
    }
}

fn quote(path: &Path) -> Result<String, ConfigError> {
    let text = path.to_string_lossy();
    shlex::try_quote(&text)
        .map(|q| q.into_owned())
        .map_err(|_| ConfigError::Quote(text.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn defaults_match_stock_layout() {
        let config = Config::default();
        assert_eq!(config.buildroot, PathBuf::from("build"));
        assert_eq!(config.compiler.sources, vec!["wit.cr", "wit/*.cr"]);
        assert_eq!(config.tests.extension, "wit");
        assert_eq!(config.artifact(&config.compiler.output), PathBuf::from("build/wit"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            buildroot = "out"

            [compiler]
            sources = ["main.c"]
            command = "cc -o {output} {inputs}"
            "#,
        )
        .unwrap();

        assert_eq!(config.buildroot, PathBuf::from("out"));
        assert_eq!(config.compiler.label, "crystal");
        assert_eq!(
            config.compiler.command,
            CommandTemplate::Shell("cc -o {output} {inputs}".into())
        );
        assert_eq!(config.program.source, PathBuf::from("prog.wit"));
        assert_eq!(config.linker.label, "ld");
    }

    #[test]
    fn partial_step_table_keeps_step_defaults() {
        let config =
            Config::parse("[assembler]\ncommand = \"yasm -f elf64 {input} -o {output}\"\n")
                .unwrap();

        assert_eq!(config.assembler.label, "nasm");
        assert_eq!(config.assembler.output, PathBuf::from("x.o"));
        assert_eq!(
            config.assembler.command,
            CommandTemplate::Shell("yasm -f elf64 {input} -o {output}".into())
        );
        assert_eq!(config.linker.label, "ld");
        assert_eq!(config.linker.output, PathBuf::from("x"));
    }

    #[test]
    fn partial_linker_table_does_not_take_assembler_defaults() {
        let config = Config::parse("[linker]\nlabel = \"mold\"\n").unwrap();

        assert_eq!(config.linker.label, "mold");
        assert_eq!(config.linker.output, PathBuf::from("x"));
        assert_eq!(config.linker.command, StepConfig::linker().command);
    }

    #[test]
    fn invalid_toml_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kiln.toml");
        fs::write(&path, "buildroot = [").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("kiln.toml"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn sources_expand_patterns_sorted_and_keep_literals() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("wit")).unwrap();
        fs::write(root.join("wit/parser.cr"), "").unwrap();
        fs::write(root.join("wit/lexer.cr"), "").unwrap();
        fs::write(root.join("wit/notes.txt"), "").unwrap();

        let mut config = Config::default();
        config.compiler.sources = vec![
            root.join("wit.cr").display().to_string(),
            root.join("wit/*.cr").display().to_string(),
            root.join("empty/*.cr").display().to_string(),
        ];

        let sources = config.compiler_sources().unwrap();
        assert_eq!(
            sources,
            vec![
                root.join("wit.cr"),
                root.join("wit/lexer.cr"),
                root.join("wit/parser.cr"),
            ]
        );
    }

    #[test]
    fn argv_template_substitutes_placeholders() {
        let template = argv(&["crystal", "build", "-o", "{output}", "{input}"]);
        let inputs = vec![PathBuf::from("wit.cr"), PathBuf::from("wit/lexer.cr")];

        let cmd = template.render(&inputs, Path::new("build/wit")).unwrap();
        assert_eq!(
            cmd,
            Command::argv(["crystal", "build", "-o", "build/wit", "wit.cr"])
        );
    }

    #[test]
    fn argv_template_expands_inputs_and_embedded_placeholders() {
        let template = argv(&["cc", "{inputs}", "-o{output}"]);
        let inputs = vec![PathBuf::from("a.c"), PathBuf::from("b.c")];

        let cmd = template.render(&inputs, Path::new("out")).unwrap();
        assert_eq!(cmd, Command::argv(["cc", "a.c", "b.c", "-oout"]));
    }

    #[test]
    fn shell_template_quotes_paths() {
        let template = CommandTemplate::Shell("cat {input} > {output}".into());
        let inputs = vec![PathBuf::from("my prog.wit")];

        let Command::Shell(line) = template.render(&inputs, Path::new("build/x.asm")).unwrap()
        else {
            panic!("expected a shell command");
        };
        assert_eq!(
            shlex::split(&line).unwrap(),
            vec!["cat", "my prog.wit", ">", "build/x.asm"]
        );
    }

    #[test]
    fn argv_template_rejects_embedded_inputs() {
        let template = argv(&["cc", "--srcs={inputs}"]);
        let inputs = vec![PathBuf::from("a.c")];

        let err = template.render(&inputs, Path::new("out")).unwrap_err();
        assert!(matches!(err, ConfigError::EmbeddedInputs(arg) if arg == "--srcs={inputs}"));
    }

    #[test]
    fn input_placeholder_without_inputs_fails() {
        let template = argv(&["cc", "{input}"]);
        let err = template.render(&[], Path::new("out")).unwrap_err();
        assert!(matches!(err, ConfigError::NoInput));
    }
}
