//! # Arbor - Hierarchical Command Trees
//!
//! Arbor builds command-line programs out of a tree of sub-commands. It
//! provides:
//!
//! - A command tree with aliases, hidden commands and positional argument
//!   bounds, frozen after startup and shareable between threads
//! - A dispatcher that resolves a token sequence into a command, detects help
//!   requests and validates argument counts
//! - Declarative flags: `#[derive(Flags)]` turns struct fields into typed
//!   options, with optional values, lists, maps and durations
//! - A bash completion compiler that reproduces the dispatcher's walk in a
//!   standalone script
//!
//! ## Core Concepts
//!
//! - [`TreeBuilder`] / [`CommandTree`]: declare commands with [`Info`], then
//!   freeze the tree
//! - [`Command`]: a leaf command. Each invocation gets a fresh instance from
//!   the node's factory
//! - [`Flags`]: binds an instance's fields into a [`FlagSet`]
//! - [`CommandTree::parse`]: resolution without side effects, returning a
//!   [`ParseResult`]
//! - [`App`]: runs a command line and maps the result to an exit status
//! - [`complete::compile`]: builds the completion tables and script
//!
//! ## Quick Start
//!
//! ```rust
//! use arbor::{App, Command, Flags, Info, TreeBuilder};
//!
//! #[derive(Default, Flags)]
//! struct Greet {
//!     #[flag("Greeting to use")]
//!     greeting: String,
//!     #[flag("n,Number of {times}")]
//!     times: u32,
//! }
//!
//! impl Command for Greet {
//!     fn run(&mut self, args: Vec<String>) -> anyhow::Result<()> {
//!         for _ in 0..self.times {
//!             println!("{} {}", self.greeting, args[0]);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut tree = TreeBuilder::new();
//! tree.add(
//!     tree.root(),
//!     Info::new("greet|hi")
//!         .summary("Print a greeting")
//!         .args(1, 1)
//!         .command(|| Greet { greeting: "hello".into(), times: 1 }),
//! )?;
//!
//! let app = App::builder().bin("demo").build(tree.build()?);
//! let mut out = Vec::new();
//! assert_eq!(app.execute(&["hi", "-n", "2", "world"], &mut out), 0);
//! assert_eq!(app.execute(&["hi"], &mut out), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Flag Declarations
//!
//! `#[flag("payload")]` takes an optional name before the first comma and the
//! usage text after it. Without a name, the field name is converted to
//! kebab-case (`dry_run` becomes `dry-run`, `HTTPServer` becomes
//! `http-server`). See [`flags`] for the value types and parsing rules.

// Lets the derive macro refer to `::arbor` from inside this crate.
extern crate self as arbor;

mod app;
mod command;
mod dispatch;
mod error;
mod tree;

pub mod complete;
pub mod flags;
pub mod help;

pub use app::{App, AppBuilder, ExitFn};
pub use command::{Command, Factory, Flags, Placeholder, Unimplemented};
pub use dispatch::{Outcome, ParseResult};
pub use error::{CompileError, ConfigError, ExitCode, FlagError, HelpRequested, UsageError};
pub use tree::{
    is_help, resolve_token, CommandTree, Info, Node, NodeId, Step, TreeBuilder, Walk, NAME_SEP,
};

// Flag schema exports
pub use flags::{flag_name, Bind, FlagSet, FlagSpec, FlagTag, Value, ValueKind};

// Help text helpers
pub use help::{dedent, sum, HelpWriter};

// Completion exports
pub use complete::{compile, CompletionSpec};

// Derive macro; shares its name with the trait, like serde's derives.
pub use arbor_macros::Flags;
