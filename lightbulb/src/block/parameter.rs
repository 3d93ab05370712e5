use std::fmt;

/// A recognized annotation key. Variants are listed in declaration order,
/// which is also the order required parameters are checked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Parameter {
    Name,
    Tags,
    Path,
    Mode,
    Command,
    Shell,
    Set,
    ExitOnError,
    Keys,
    Prompt,
    Secret,
    Persist,
    Sensitive,
}

impl Parameter {
    pub const ALL: [Parameter; 13] = [
        Parameter::Name,
        Parameter::Tags,
        Parameter::Path,
        Parameter::Mode,
        Parameter::Command,
        Parameter::Shell,
        Parameter::Set,
        Parameter::ExitOnError,
        Parameter::Keys,
        Parameter::Prompt,
        Parameter::Secret,
        Parameter::Persist,
        Parameter::Sensitive,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        let parameter = match key {
            "name" => Parameter::Name,
            "tags" => Parameter::Tags,
            "path" => Parameter::Path,
            "mode" => Parameter::Mode,
            "command" | "code-source" => Parameter::Command,
            "shell" => Parameter::Shell,
            "set" => Parameter::Set,
            "exitOnError" | "exit_on_error" => Parameter::ExitOnError,
            "keys" => Parameter::Keys,
            "prompt" => Parameter::Prompt,
            "secret" => Parameter::Secret,
            "persist" => Parameter::Persist,
            "sensitive" => Parameter::Sensitive,
            _ => return None,
        };
        Some(parameter)
    }

    /// Canonical spelling of the key.
    pub fn key(self) -> &'static str {
        match self {
            Parameter::Name => "name",
            Parameter::Tags => "tags",
            Parameter::Path => "path",
            Parameter::Mode => "mode",
            Parameter::Command => "command",
            Parameter::Shell => "shell",
            Parameter::Set => "set",
            Parameter::ExitOnError => "exitOnError",
            Parameter::Keys => "keys",
            Parameter::Prompt => "prompt",
            Parameter::Secret => "secret",
            Parameter::Persist => "persist",
            Parameter::Sensitive => "sensitive",
        }
    }

    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            Parameter::ExitOnError
                | Parameter::Prompt
                | Parameter::Secret
                | Parameter::Persist
                | Parameter::Sensitive
        )
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.key())
    }
}
