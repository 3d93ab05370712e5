use std::fmt;

use crate::block::Parameter;

/// The operation a block performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Write the fence body to `path`.
    CreateFile,
    /// Run the fence body as a script under `shell`.
    RunShell,
    /// Populate environment variables. Reserved: validated but not yet executed.
    SetEnvironmentVars,
}

impl Action {
    pub const ALL: [Action; 3] = [
        Action::CreateFile,
        Action::RunShell,
        Action::SetEnvironmentVars,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.tag() == tag)
    }

    /// The tag as written in an annotation (`lightbulb:<tag>`).
    pub fn tag(self) -> &'static str {
        match self {
            Action::CreateFile => "createFile",
            Action::RunShell => "runShell",
            Action::SetEnvironmentVars => "setEnvironmentVars",
        }
    }

    /// Parameters this action cannot do without, in declaration order.
    pub fn required_parameters(self) -> &'static [Parameter] {
        match self {
            Action::CreateFile => &[Parameter::Name, Parameter::Path],
            Action::RunShell => &[Parameter::Name],
            Action::SetEnvironmentVars => &[Parameter::Name, Parameter::Keys],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.tag())
    }
}
