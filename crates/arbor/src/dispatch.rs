//! Command-line dispatch.
//!
//! [`CommandTree::parse`] turns a token sequence into a command instance with
//! its flags applied and the remaining positional arguments, or into a help or
//! usage outcome. It never runs the command and never prints anything; that is
//! left to [`App`](crate::App).
//!
//! # Stages
//!
//! 1. **Walk**: descend from the root while the current node is a group,
//!    one token per level (see [`CommandTree::walk`]).
//! 2. **Help check**: a help literal right after the path requests help for
//!    the node reached.
//! 3. **Flags**: bind the fresh instance's flags and parse them from the
//!    front of the remaining tokens.
//! 4. **Arity**: check the positional count against the node's bounds.

use std::fmt;

use tracing::debug;

use crate::command::Command;
use crate::error::FlagError;
use crate::flags::FlagSet;
use crate::tree::{is_help, CommandTree, Node};

/// How parsing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command is ready to run.
    Ok,
    /// Help for the resolved node was requested.
    Help,
    /// The command line is invalid.
    Usage(String),
}

/// A resolved command line.
pub struct ParseResult<'t> {
    /// Deepest node reached.
    pub node: Node<'t>,
    /// Fresh instance of the node's command with flags applied.
    pub command: Box<dyn Command>,
    /// Positional arguments. Empty unless the outcome is [`Outcome::Ok`].
    pub args: Vec<String>,
    pub outcome: Outcome,
}

impl fmt::Debug for ParseResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseResult")
            .field("node", &self.node)
            .field("args", &self.args)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl CommandTree {
    /// Resolves `tokens` (program name excluded) to a command.
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> ParseResult<'_> {
        let walk = self.walk(tokens);
        let node = self.node(walk.node);
        let mut args: Vec<String> = tokens[walk.consumed..]
            .iter()
            .map(|t| t.as_ref().to_string())
            .collect();

        let mut outcome = match walk.unknown {
            Some(token) => Outcome::Usage(format!("unknown command {token:?}")),
            None if walk.help => Outcome::Help,
            None if args.first().is_some_and(|t| is_help(t)) => Outcome::Help,
            None => Outcome::Ok,
        };

        let mut command = node.instantiate();
        if outcome == Outcome::Ok && !args.is_empty() {
            let mut set = FlagSet::new();
            // Schemas were validated by `TreeBuilder::build`; a failure here
            // means the factory declared different flags this time.
            outcome = match command.define_flags(&mut set) {
                Err(e) => Outcome::Usage(e.to_string()),
                Ok(()) => match set.parse(&args) {
                    Ok(positional) => {
                        args = positional;
                        Outcome::Ok
                    }
                    Err(FlagError::Help) => Outcome::Help,
                    Err(e) => Outcome::Usage(e.to_string()),
                },
            };
        }

        if outcome == Outcome::Ok {
            if let Err(msg) = check_arity(node, args.len()) {
                outcome = Outcome::Usage(msg);
            }
        }
        if outcome != Outcome::Ok {
            args.clear();
        }

        debug!(
            command = %node.full_name(""),
            args = args.len(),
            ?outcome,
            "parsed command line"
        );
        ParseResult {
            node,
            command,
            args,
            outcome,
        }
    }
}

/// Checks a positional argument count against the node's bounds.
pub(crate) fn check_arity(node: Node<'_>, n: usize) -> Result<(), String> {
    let min = node.min_args();
    match node.max_args() {
        Some(max) if max == min && n != min => {
            if min == 0 {
                Err("command does not accept any arguments".to_string())
            } else {
                Err(format!("command requires {min} argument(s)"))
            }
        }
        _ if n < min => Err(format!("command requires at least {min} argument(s)")),
        Some(max) if n > max => Err(format!("command accepts at most {max} argument(s)")),
        _ => Ok(()),
    }
}
