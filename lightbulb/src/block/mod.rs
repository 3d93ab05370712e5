pub mod action;
pub mod parameter;

use std::collections::BTreeSet;
use std::ops::Range;

pub use action::Action;
pub use parameter::Parameter;

pub const DEFAULT_TAG: &str = "all";
pub const DEFAULT_MODE: &str = "0700";
pub const DEFAULT_SHELL: &str = "bash";

/// One annotation and the fenced code that follows it, compiled into a unit
/// of work. Blocks are the fundamental unit of execution in lightbulb.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub action: Action,
    /// Human-readable identifier used in logs and diagnostics.
    pub name: String,
    /// Labels for include/skip filtering. Never empty.
    pub tags: BTreeSet<String>,
    /// Destination path for `createFile`.
    pub path: Option<String>,
    /// Permission bits as an octal string, e.g. `"0700"`.
    pub mode: String,
    /// Fence body: file content for `createFile`, script body for `runShell`.
    pub code: String,
    /// Interpreter for `runShell`. Bare names resolve to `/bin/<name>`.
    pub shell: String,
    /// Environment variable to populate.
    pub set: Option<String>,
    pub exit_on_error: bool,
    pub keys: BTreeSet<String>,
    pub prompt: bool,
    pub secret: bool,
    pub persist: bool,
    pub sensitive: bool,
    /// Byte span of the annotation and its fence in source.
    pub span: Range<usize>,
}

impl Block {
    /// A block with every parameter at its documented default.
    pub fn new(action: Action, span: Range<usize>) -> Self {
        Block {
            action,
            name: String::new(),
            tags: default_tags(),
            path: None,
            mode: DEFAULT_MODE.to_string(),
            code: String::new(),
            shell: DEFAULT_SHELL.to_string(),
            set: None,
            exit_on_error: true,
            keys: BTreeSet::new(),
            prompt: false,
            secret: false,
            persist: true,
            sensitive: false,
            span,
        }
    }

    pub fn has_any_tag<'a>(&self, tags: impl IntoIterator<Item = &'a String>) -> bool {
        tags.into_iter().any(|tag| self.tags.contains(tag))
    }
}

pub fn default_tags() -> BTreeSet<String> {
    BTreeSet::from([DEFAULT_TAG.to_string()])
}
