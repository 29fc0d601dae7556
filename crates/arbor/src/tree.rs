//! Command tree.
//!
//! Commands live in an arena owned by a [`TreeBuilder`] while the program
//! declares them, and by an immutable [`CommandTree`] afterwards. Nodes are
//! addressed by [`NodeId`] and inspected through the borrowed [`Node`] view.
//!
//! # Names and aliases
//!
//! A node name may list several aliases separated by `|`. The first one is
//! the primary name used in help and completion; every alias resolves to the
//! same node.
//!
//! ```rust
//! use arbor::{Info, TreeBuilder};
//!
//! let mut b = TreeBuilder::new();
//! let group = b.add(b.root(), Info::new("group|g").summary("Group commands"))?;
//! let run = b.add(group, Info::new("run").args(1, 2))?;
//! let tree = b.build()?;
//!
//! assert_eq!(tree.node(run).full_name("bin"), "bin group run");
//! assert_eq!(tree.node(group).full_name("bin"), "bin {group|g}");
//! # Ok::<(), arbor::ConfigError>(())
//! ```
//!
//! # Groups and leaves
//!
//! A node with children is a group and cannot run anything itself. A node
//! without children is a leaf: it either has a command factory or acts as a
//! placeholder that reports "not implemented".

use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

use crate::command::{Command, Factory, Placeholder};
use crate::error::ConfigError;
use crate::flags::FlagSet;

/// Separator between aliases in a node name.
pub const NAME_SEP: char = '|';

/// Returns true if `token` is a request for help.
pub fn is_help(token: &str) -> bool {
    matches!(token, "help" | "-help" | "--help" | "-h" | "/?")
}

/// Index of a node in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Declaration of one command.
pub struct Info {
    name: String,
    usage: String,
    summary: String,
    min_args: usize,
    max_args: Option<usize>,
    hidden: bool,
    factory: Option<Factory>,
}

impl Info {
    /// Starts a declaration. The command accepts no positional arguments
    /// until [`args`](Self::args) or [`variadic`](Self::variadic) says
    /// otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: String::new(),
            summary: String::new(),
            min_args: 0,
            max_args: Some(0),
            hidden: false,
            factory: None,
        }
    }

    /// Option and argument syntax shown after the command name.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// One-line description without a trailing period.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Positional argument bounds. A `max` below `min` means no upper bound.
    pub fn args(mut self, min: usize, max: usize) -> Self {
        self.min_args = min;
        self.max_args = (max >= min).then_some(max);
        self
    }

    /// At least `min` positional arguments, no upper bound.
    pub fn variadic(mut self, min: usize) -> Self {
        self.min_args = min;
        self.max_args = None;
        self
    }

    /// Hides the command from help listings and completion. It still runs.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Sets the factory that creates a fresh command for each invocation.
    pub fn command<C, F>(mut self, factory: F) -> Self
    where
        C: Command + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(move || Box::new(factory()) as Box<dyn Command>));
        self
    }
}

impl fmt::Debug for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Info")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("hidden", &self.hidden)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

struct NodeData {
    info: Info,
    aliases: Vec<String>,
    parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
    order: Vec<NodeId>,
}

impl NodeData {
    fn new(info: Info) -> Self {
        Self {
            info,
            aliases: Vec::new(),
            parent: None,
            children: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    fn label(&self) -> &str {
        &self.info.name
    }
}

/// Mutable tree under construction.
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    /// Creates a builder with an unnamed root group.
    pub fn new() -> Self {
        Self::with_root(Info::new(""))
    }

    /// Creates a builder whose root carries `info`. The root name is always
    /// empty; the binary name takes its place in help output.
    pub fn with_root(mut info: Info) -> Self {
        info.name.clear();
        Self {
            nodes: vec![NodeData::new(info)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Creates a detached node. It must be [attached](Self::attach) before
    /// [`build`](Self::build).
    pub fn node(&mut self, info: Info) -> NodeId {
        self.nodes.push(NodeData::new(info));
        NodeId(self.nodes.len() - 1)
    }

    /// Registers `child` under `parent` with all of its aliases.
    ///
    /// Nothing changes when an error is returned.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), ConfigError> {
        let label = self.nodes[child.0].label().to_string();
        if child == self.root() || self.nodes[child.0].parent.is_some() {
            return Err(ConfigError::AlreadyAttached(label));
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(ConfigError::Cycle(label));
            }
            cursor = self.nodes[id.0].parent;
        }

        let aliases: Vec<String> = label.split(NAME_SEP).map(str::to_string).collect();
        let siblings = &self.nodes[parent.0].children;
        for (i, alias) in aliases.iter().enumerate() {
            if alias.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if siblings.contains_key(alias) || aliases[..i].contains(alias) {
                return Err(ConfigError::DuplicateName(alias.clone()));
            }
        }

        trace!(parent = parent.0, name = %label, "command attached");
        let p = &mut self.nodes[parent.0];
        for alias in &aliases {
            p.children.insert(alias.clone(), child);
        }
        p.order.push(child);
        let c = &mut self.nodes[child.0];
        c.aliases = aliases;
        c.parent = Some(parent);
        Ok(())
    }

    /// Creates a node and attaches it under `parent`.
    pub fn add(&mut self, parent: NodeId, info: Info) -> Result<NodeId, ConfigError> {
        let id = self.node(info);
        match self.attach(parent, id) {
            Ok(()) => Ok(id),
            Err(e) => {
                self.nodes.pop();
                Err(e)
            }
        }
    }

    /// Freezes the tree.
    ///
    /// Fails when a group also has a factory, when a node is not connected to
    /// the root, or when a command declares an invalid flag schema.
    pub fn build(self) -> Result<CommandTree, ConfigError> {
        for (i, node) in self.nodes.iter().enumerate() {
            if !node.children.is_empty() && node.info.factory.is_some() {
                return Err(ConfigError::GroupWithFactory(node.label().to_string()));
            }
            let mut top = NodeId(i);
            while let Some(p) = self.nodes[top.0].parent {
                top = p;
            }
            if top != NodeId(0) {
                return Err(ConfigError::Detached(node.label().to_string()));
            }
            if let Some(factory) = &node.info.factory {
                let mut command = factory();
                command.define_flags(&mut FlagSet::new())?;
            }
        }
        Ok(CommandTree { nodes: self.nodes })
    }
}

/// Immutable command tree. Safe to share between threads.
pub struct CommandTree {
    nodes: Vec<NodeData>,
}

/// Result of resolving one token against a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<N = NodeId> {
    /// The token asks for help. Descent continues.
    Help,
    /// Empty token, ignored.
    Skip,
    /// The token names a child.
    Child(N),
    /// The token names nothing. Descent stops.
    Unknown,
}

/// Classifies one path token. Help literals win over child names; `lookup`
/// maps any other non-empty token to a child.
///
/// Both the dispatcher walk and the completion tables resolve tokens through
/// this function.
pub fn resolve_token<N>(token: &str, lookup: impl FnOnce(&str) -> Option<N>) -> Step<N> {
    if is_help(token) {
        Step::Help
    } else if token.is_empty() {
        Step::Skip
    } else {
        lookup(token).map_or(Step::Unknown, Step::Child)
    }
}

/// Where a token walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    pub node: NodeId,
    /// Number of tokens consumed by the walk, not counting an unknown token.
    pub consumed: usize,
    pub help: bool,
    pub unknown: Option<String>,
}

impl CommandTree {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Returns a view of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to another tree with more nodes.
    pub fn node(&self, id: NodeId) -> Node<'_> {
        assert!(id.0 < self.nodes.len(), "node id out of range");
        Node { tree: self, id }
    }

    /// All nodes in creation order, root first.
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> {
        (0..self.nodes.len()).map(move |i| Node {
            tree: self,
            id: NodeId(i),
        })
    }

    /// Resolves one token against the children of `node`.
    pub fn resolve(&self, node: NodeId, token: &str) -> Step {
        resolve_token(token, |t| self.nodes[node.0].children.get(t).copied())
    }

    /// Descends from the root while the current node is a group and tokens
    /// remain.
    pub fn walk<S: AsRef<str>>(&self, tokens: &[S]) -> Walk {
        let mut walk = Walk {
            node: self.root(),
            consumed: 0,
            help: false,
            unknown: None,
        };
        while walk.consumed < tokens.len() && !self.nodes[walk.node.0].children.is_empty() {
            let token = tokens[walk.consumed].as_ref();
            let step = self.resolve(walk.node, token);
            trace!(token, ?step, "resolve");
            match step {
                Step::Help => walk.help = true,
                Step::Skip => {}
                Step::Child(child) => walk.node = child,
                Step::Unknown => {
                    walk.unknown = Some(token.to_string());
                    break;
                }
            }
            walk.consumed += 1;
        }
        walk
    }
}

impl fmt::Debug for CommandTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.nodes().map(|n| n.full_name("")).collect();
        f.debug_struct("CommandTree").field("nodes", &names).finish()
    }
}

/// Borrowed view of one node.
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t CommandTree,
    id: NodeId,
}

impl<'t> Node<'t> {
    fn data(&self) -> &'t NodeData {
        &self.tree.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t CommandTree {
        self.tree
    }

    /// Raw name including all aliases. Empty for the root.
    pub fn name(&self) -> &'t str {
        &self.data().info.name
    }

    /// First alias.
    pub fn primary_name(&self) -> &'t str {
        self.data().aliases.first().map_or("", String::as_str)
    }

    pub fn aliases(&self) -> &'t [String] {
        &self.data().aliases
    }

    pub fn is_root(&self) -> bool {
        self.id == self.tree.root()
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.data().parent.map(|id| self.tree.node(id))
    }

    /// Children in registration order, hidden ones included.
    pub fn children(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        self.data().order.iter().map(move |&id| tree.node(id))
    }

    /// Visible children sorted by primary name.
    pub fn visible_children(&self) -> Vec<Node<'t>> {
        let mut out: Vec<_> = self.children().filter(|c| !c.hidden()).collect();
        out.sort_by_key(|c| c.primary_name());
        out
    }

    /// Looks up a child by any of its aliases.
    pub fn child(&self, alias: &str) -> Option<Node<'t>> {
        self.data().children.get(alias).map(|&id| self.tree.node(id))
    }

    pub fn is_group(&self) -> bool {
        !self.data().children.is_empty()
    }

    pub fn min_args(&self) -> usize {
        self.data().info.min_args
    }

    /// Upper bound on positionals. `None` means unbounded.
    pub fn max_args(&self) -> Option<usize> {
        self.data().info.max_args
    }

    pub fn hidden(&self) -> bool {
        self.data().info.hidden
    }

    pub fn summary(&self) -> &'t str {
        &self.data().info.summary
    }

    pub fn usage(&self) -> &'t str {
        &self.data().info.usage
    }

    pub fn has_factory(&self) -> bool {
        self.data().info.factory.is_some()
    }

    /// Creates a fresh command, or a [`Placeholder`] for nodes without a
    /// factory.
    pub fn instantiate(&self) -> Box<dyn Command> {
        match &self.data().info.factory {
            Some(factory) => factory(),
            None => Box::new(Placeholder),
        }
    }

    /// Primary names from the root down to this node, root excluded.
    pub fn path(&self) -> Vec<&'t str> {
        let mut out = Vec::new();
        let mut cursor = Some(*self);
        while let Some(node) = cursor {
            if !node.is_root() {
                out.push(node.primary_name());
            }
            cursor = node.parent();
        }
        out.reverse();
        out
    }

    /// Fully qualified name: `prefix`, the primary names of all ancestors and
    /// this node's name. A name with aliases is shown in braces.
    pub fn full_name(&self, prefix: &str) -> String {
        let mut out = prefix.to_string();
        let path = self.path();
        if let Some((_, ancestors)) = path.split_last() {
            for name in ancestors {
                out.push(' ');
                out.push_str(name);
            }
            out.push(' ');
            if self.aliases().len() > 1 {
                out.push('{');
                out.push_str(self.name());
                out.push('}');
            } else {
                out.push_str(self.name());
            }
        }
        out.trim().to_string()
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}
