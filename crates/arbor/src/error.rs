//! Error types.
//!
//! Errors fall into three families with different lifetimes:
//!
//! - [`ConfigError`]: a mistake in how the program declared its commands or
//!   flags. Raised while the tree is built or a flag schema is bound, and
//!   meant to be checked once at startup.
//! - [`UsageError`], [`HelpRequested`] and [`ExitCode`]: conditions reached
//!   while dispatching user input. [`App`](crate::App) maps each one to an
//!   exit status and output.
//! - [`FlagError`] and [`CompileError`]: component-specific failures that are
//!   converted into one of the above at the boundary.

use thiserror::Error;

/// A programming error in the command tree or flag declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A command name (or one of its `|`-separated aliases) is empty.
    #[error("missing command name")]
    EmptyName,

    /// The node was already attached to a parent.
    #[error("command already has a parent: {0}")]
    AlreadyAttached(String),

    /// Attaching the node would create a cycle (root or an ancestor).
    #[error("command cannot be attached below itself: {0}")]
    Cycle(String),

    /// An alias collides with an existing sibling name.
    #[error("duplicate command name: {0}")]
    DuplicateName(String),

    /// A node has both children and a command factory.
    #[error("command group cannot have a factory: {0}")]
    GroupWithFactory(String),

    /// A node was created but never attached to the tree.
    #[error("command was never attached: {0}")]
    Detached(String),

    /// A flag name is empty or contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid flag name: {0:?}")]
    InvalidFlagName(String),

    /// Two fields resolve to the same flag name.
    #[error("flag redefined: {0}")]
    DuplicateFlag(String),
}

/// A problem with the command line the user typed.
///
/// Rendered as `Error: <message>` followed by the command usage, exit status 2.
/// Commands may return it from [`Command::run`](crate::Command::run) to get the
/// same treatment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UsageError(pub String);

impl UsageError {
    /// Creates a usage error from any displayable message.
    pub fn new(msg: impl Into<String>) -> Self {
        UsageError(msg.into())
    }
}

impl From<FlagError> for UsageError {
    fn from(e: FlagError) -> Self {
        UsageError(e.to_string())
    }
}

/// Sentinel returned by a command to request help output (exit status 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("help requested")]
pub struct HelpRequested;

/// Sentinel that sets the exit status without printing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("exit code {0}")]
pub struct ExitCode(pub i32);

/// Errors produced while parsing flag tokens.
///
/// The messages match what users of Go-style flag parsers expect, which is
/// why the flag name is always printed with a single leading dash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    /// `-h` or `-help` was given and no such flag is defined.
    #[error("flag: help requested")]
    Help,

    /// A token starting with `-` that is not a valid flag (`---x`, `-=x`).
    #[error("bad flag syntax: {0}")]
    BadSyntax(String),

    /// A flag that the command does not define.
    #[error("flag provided but not defined: -{0}")]
    Undefined(String),

    /// A non-boolean flag at the end of the input without a value.
    #[error("flag needs an argument: -{0}")]
    MissingValue(String),

    /// A boolean flag given an unparsable `=value`.
    #[error("invalid boolean value {value:?} for -{name}: {reason}")]
    InvalidBool {
        name: String,
        value: String,
        reason: String,
    },

    /// Any other flag whose value was rejected.
    #[error("invalid value {value:?} for flag -{name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// Errors produced by the completion compiler.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A leaf command declared an invalid flag schema.
    #[error("flag schema of {command}: {source}")]
    Schema {
        command: String,
        #[source]
        source: ConfigError,
    },

    /// The completion template failed to render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}
