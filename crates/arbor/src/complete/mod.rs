//! Bash completion compiler.
//!
//! [`compile`] flattens a [`CommandTree`] into tables, and
//! [`CompletionSpec::render`] writes them into a bash function that repeats
//! the dispatcher's walk over `COMP_WORDS` without running the program.
//!
//! # Tables
//!
//! Visible nodes are numbered in pre-order, the root being `0`. The script
//! keeps four tables:
//!
//! | Variable  | Key              | Value                                  |
//! |-----------|------------------|----------------------------------------|
//! | `_res`    | `"<node> <name>"`| node reached by a child alias          |
//! | `_arg`    | `"<node> <flag>"`| `file`, `dir` or `words`               |
//! | `_words`  | node             | completion words                       |
//! | `_leaf`, `_dflt` | node      | set for leaves / nodes taking positionals |
//!
//! `_res` holds every alias, so folding an alias into its canonical node is
//! the same lookup as resolving a primary name. Associative arrays need
//! bash 4.
//!
//! # Example
//!
//! ```rust
//! use arbor::{complete, Info, TreeBuilder};
//!
//! let mut b = TreeBuilder::new();
//! let g = b.add(b.root(), Info::new("group|g"))?;
//! b.add(g, Info::new("run").args(1, 2))?;
//! let spec = complete::compile(&b.build()?, "bin")?;
//!
//! assert_eq!(spec.cmds[0].words, ["group", "help"]);
//! assert_eq!(spec.refs["g"], "group");
//! let script = spec.render()?;
//! assert!(script.ends_with("complete -F _bin bin\n"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod model;

use std::collections::BTreeMap;

use minijinja::{context, Environment};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::CompileError;
use crate::flags::{ArgCompletion, FlagSet};
use crate::tree::{CommandTree, Node};

pub use model::{Position, Reply};

const TEMPLATE: &str = include_str!("completion.bash");

/// Completion data for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CmdSpec {
    /// Primary names from the root.
    pub path: Vec<String>,
    pub leaf: bool,
    /// Primary names of the children plus `help` for groups, `-flag` names
    /// for leaves. Sorted.
    pub words: Vec<String>,
    /// The node accepts positional arguments, so bash falls back to its
    /// default completion when no word matches.
    pub bashdefault: bool,
    /// Every alias of every visible child, mapped to the child's number.
    pub children: BTreeMap<String, usize>,
    /// Value completion per flag. Bool flags take no value and are absent.
    pub args: BTreeMap<String, ArgCompletion>,
}

/// Compiled completion tables for a whole tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionSpec {
    /// Program name completed by the script.
    pub bin: String,
    /// Name of the generated function, without the leading `_`.
    pub func: String,
    /// Nodes in pre-order. Index 0 is the root.
    pub cmds: Vec<CmdSpec>,
    /// Alias path to canonical path, for every non-primary alias.
    pub refs: BTreeMap<String, String>,
}

/// Compiles completion tables for `tree`, completing the program `bin`.
///
/// Hidden commands and flags are left out. Leaves are instantiated once to
/// read their flag schema.
pub fn compile(tree: &CommandTree, bin: &str) -> Result<CompletionSpec, CompileError> {
    let mut spec = CompletionSpec {
        bin: bin.to_string(),
        func: func_name(bin),
        cmds: Vec::new(),
        refs: BTreeMap::new(),
    };
    visit(&mut spec, tree.node(tree.root()))?;
    debug!(
        bin,
        commands = spec.cmds.len(),
        aliases = spec.refs.len(),
        "compiled completion tables"
    );
    Ok(spec)
}

fn visit(spec: &mut CompletionSpec, node: Node<'_>) -> Result<usize, CompileError> {
    let id = spec.cmds.len();
    let path: Vec<String> = node.path().into_iter().map(str::to_string).collect();
    trace!(id, path = %path.join(" "), "completion node");
    spec.cmds.push(CmdSpec {
        path: path.clone(),
        leaf: !node.is_group(),
        words: Vec::new(),
        bashdefault: node.max_args().map_or(true, |max| max > 0),
        children: BTreeMap::new(),
        args: BTreeMap::new(),
    });

    let mut words = Vec::new();
    let mut children = BTreeMap::new();
    let mut args = BTreeMap::new();

    if node.is_group() {
        words.push("help".to_string());
        for child in node.children().filter(|c| !c.hidden()) {
            let child_id = visit(spec, child)?;
            let canonical = spec.cmds[child_id].path.join(" ");
            words.push(child.primary_name().to_string());
            for (i, alias) in child.aliases().iter().enumerate() {
                if i > 0 {
                    spec.refs.insert(join_path(&path, alias), canonical.clone());
                }
                children.insert(alias.clone(), child_id);
            }
        }
    } else {
        let mut command = node.instantiate();
        let mut set = FlagSet::new();
        command
            .define_flags(&mut set)
            .map_err(|source| CompileError::Schema {
                command: node.full_name(&spec.bin),
                source,
            })?;
        for flag in set.specs().into_iter().filter(|f| !f.hidden) {
            words.push(format!("-{}", flag.name));
            if let Some(class) = flag.completion() {
                args.insert(flag.name, class);
            }
        }
    }

    words.sort();
    words.dedup();
    let cmd = &mut spec.cmds[id];
    cmd.words = words;
    cmd.children = children;
    cmd.args = args;
    Ok(id)
}

fn join_path(path: &[String], last: &str) -> String {
    let mut out = path.join(" ");
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(last);
    out
}

/// Function names may only use `[A-Za-z0-9_]`.
fn func_name(bin: &str) -> String {
    let base = bin.rsplit('/').next().unwrap_or(bin);
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[derive(Serialize)]
struct ScriptNode {
    id: usize,
    words: String,
}

#[derive(Serialize)]
struct ScriptEntry {
    key: String,
    target: String,
}

#[derive(Serialize)]
struct ScriptArg {
    key: String,
    class: &'static str,
}

impl CompletionSpec {
    /// Looks up a node by a path of aliases.
    pub fn get(&self, path: &[&str]) -> Option<&CmdSpec> {
        let mut id = 0;
        for name in path {
            id = *self.cmds.get(id)?.children.get(*name)?;
        }
        self.cmds.get(id)
    }

    /// Writes the bash completion script.
    pub fn render(&self) -> Result<String, CompileError> {
        let mut nodes = Vec::with_capacity(self.cmds.len());
        let mut res = Vec::new();
        let mut args = Vec::new();
        let mut leaves = Vec::new();
        let mut dflt = Vec::new();
        for (id, cmd) in self.cmds.iter().enumerate() {
            let words: Vec<String> = cmd.words.iter().map(|w| compgen_word(w)).collect();
            nodes.push(ScriptNode {
                id,
                words: shell_quote(&words.join(" ")),
            });
            for (alias, child) in &cmd.children {
                res.push(ScriptEntry {
                    key: shell_quote(&format!("{id} {alias}")),
                    target: child.to_string(),
                });
            }
            for (name, class) in &cmd.args {
                args.push(ScriptArg {
                    key: shell_quote(&format!("{id} {name}")),
                    class: match class {
                        ArgCompletion::File => "file",
                        ArgCompletion::Dir => "dir",
                        ArgCompletion::Words => "words",
                    },
                });
            }
            if cmd.leaf {
                leaves.push(format!("[{id}]=1"));
            }
            if cmd.bashdefault {
                dflt.push(format!("[{id}]=1"));
            }
        }

        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_template("completion.bash", TEMPLATE)?;
        let script = env.get_template("completion.bash")?.render(context! {
            func => self.func,
            bin => shell_quote(&self.bin),
            nodes => nodes,
            res => res,
            args => args,
            leaves => leaves.join(" "),
            dflt => dflt.join(" "),
        })?;
        Ok(script)
    }

    /// Serializes the tables as pretty-printed JSON, for inspection.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Escapes a word for `compgen -W`, which expands each word again.
fn compgen_word(w: &str) -> String {
    let mut out = String::with_capacity(w.len());
    for c in w.chars() {
        if !(c.is_alphanumeric() || "_-./:=+,%@".contains(c)) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Quotes `s` for the shell unless it only has unambiguous characters.
fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '+'));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
