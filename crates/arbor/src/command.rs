//! Command traits.
//!
//! A leaf in the command tree is backed by a factory that produces a fresh
//! [`Command`] for every invocation. The dispatcher binds the instance's flags,
//! parses the command line into it and then calls [`Command::run`] with the
//! remaining positional arguments.
//!
//! ```rust
//! use arbor::{Command, Flags};
//!
//! #[derive(Default, Flags)]
//! struct Greet {
//!     #[flag("Name to greet")]
//!     name: String,
//!     #[flag("v,Verbose output")]
//!     verbose: bool,
//! }
//!
//! impl Command for Greet {
//!     fn run(&mut self, _args: Vec<String>) -> anyhow::Result<()> {
//!         println!("hello {}", self.name);
//!         Ok(())
//!     }
//! }
//! ```

use thiserror::Error;

use crate::error::ConfigError;
use crate::flags::FlagSet;

/// Declares the flags of a type by binding its fields into a [`FlagSet`].
///
/// Usually derived. A hand-written impl calls [`FlagSet::bind`] once per
/// field; types without flags implement it with an empty body.
pub trait Flags {
    fn define_flags<'a>(&'a mut self, set: &mut FlagSet<'a>) -> Result<(), ConfigError>;
}

/// An executable leaf command.
pub trait Command: Flags {
    /// Runs the command with the positional arguments left after flag parsing.
    ///
    /// Return [`UsageError`](crate::UsageError),
    /// [`HelpRequested`](crate::HelpRequested) or [`ExitCode`](crate::ExitCode)
    /// to control how the app reports the result.
    fn run(&mut self, args: Vec<String>) -> anyhow::Result<()>;

    /// Extended help text shown instead of the one-line summary. Leading tab
    /// indentation is removed.
    fn help(&self) -> Option<String> {
        None
    }
}

/// Factory stored in leaf nodes.
pub type Factory = Box<dyn Fn() -> Box<dyn Command> + Send + Sync>;

/// Command used for nodes that have no factory: groups and declared but
/// unimplemented leaves. Running it always fails with [`Unimplemented`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Placeholder;

impl Flags for Placeholder {
    fn define_flags<'a>(&'a mut self, _set: &mut FlagSet<'a>) -> Result<(), ConfigError> {
        Ok(())
    }
}

impl Command for Placeholder {
    fn run(&mut self, _args: Vec<String>) -> anyhow::Result<()> {
        Err(Unimplemented.into())
    }
}

/// Marker error returned by [`Placeholder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command not implemented")]
pub struct Unimplemented;
