//! Build actions: one external command with declared inputs and a declared output.

use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::runner::Command;

/// A single build step.
///
/// Identity is the ordered list of inputs plus the output path;
/// the same identity always names the same artifact.
#[derive(Debug, Clone)]
pub struct BuildAction {
    /// Short tool name shown in progress lines (e.g. `crystal`, `nasm`).
    pub label: String,

    /// Human-readable summary, e.g. `wit.cr -> build/wit`.
    pub description: String,

    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub command: Command,
    pub color: Color,
}

impl BuildAction {
    /// Stable digest of the action's identity, used as the memo key.
    ///
    /// Paths are separated by NUL, which cannot appear in a path.
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        for input in &self.inputs {
            hasher.update(input.as_os_str().as_encoded_bytes());
            hasher.update([0]);
        }
        hasher.update(b"->");
        hasher.update(self.output.as_os_str().as_encoded_bytes());
        hex::encode(hasher.finalize())
    }

    /// The `[label] description` progress line.
    pub fn banner(&self, colored: bool) -> String {
        let label = format!("[{}]", self.label);
        let label = if colored {
            self.color.paint(&label)
        } else {
            label
        };
        format!("{label} {}", self.description)
    }
}

/// Display color for an action's progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Green,
    Yellow,
    Magenta,
    Cyan,
}

impl Color {
    fn ansi_code(self) -> u8 {
        match self {
            Self::Green => 32,
            Self::Yellow => 33,
            Self::Magenta => 35,
            Self::Cyan => 36,
        }
    }

    pub fn paint(self, text: &str) -> String {
        format!("\x1b[{}m{text}\x1b[0m", self.ansi_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(inputs: &[&str], output: &str) -> BuildAction {
        BuildAction {
            label: "crystal".into(),
            description: "test".into(),
            inputs: inputs.iter().map(PathBuf::from).collect(),
            output: PathBuf::from(output),
            command: Command::argv(["true"]),
            color: Color::Yellow,
        }
    }

    #[test]
    fn key_is_stable_for_same_identity() {
        let a = action(&["wit.cr", "wit/lexer.cr"], "build/wit");
        let b = action(&["wit.cr", "wit/lexer.cr"], "build/wit");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().len(), 64);
    }

    #[test]
    fn key_depends_on_input_order_and_output() {
        let base = action(&["a.cr", "b.cr"], "build/wit");
        assert_ne!(base.key(), action(&["b.cr", "a.cr"], "build/wit").key());
        assert_ne!(base.key(), action(&["a.cr", "b.cr"], "build/other").key());
    }

    #[test]
    fn key_ignores_command_and_label() {
        let a = action(&["a.cr"], "build/wit");
        let mut b = a.clone();
        b.label = "other".into();
        b.command = Command::Shell("make".into());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn key_does_not_merge_adjacent_paths() {
        assert_ne!(
            action(&["ab", "c"], "out").key(),
            action(&["a", "bc"], "out").key()
        );
    }

    #[test]
    fn banner_plain_and_colored() {
        let a = action(&["a.cr"], "build/wit");
        assert_eq!(a.banner(false), "[crystal] test");
        assert_eq!(a.banner(true), "\x1b[33m[crystal]\x1b[0m test");
    }
}
