//! Flag schema compiler.
//!
//! A command describes its flags by implementing [`Flags`](crate::Flags),
//! usually through `#[derive(Flags)]`. The description is evaluated against a
//! live command instance: every flag borrows the field it writes to, so
//! parsing updates the instance in place and defaults are simply the field
//! values the instance was created with.
//!
//! # Syntax
//!
//! | form | meaning |
//! |------|---------|
//! | `-name`, `--name` | set a bool flag to true |
//! | `-name=value` | set any flag |
//! | `-name value` | set a non-bool flag |
//! | `--` | end of flags; the rest are positionals |
//!
//! Parsing stops at the first token that does not start with `-` (a lone `-`
//! counts as a positional).
//!
//! # Value completion
//!
//! A `{file}` or `<file>` placeholder in the usage text asks shell completion
//! to offer file names, `{dir}`/`<dir>` directories. Other placeholders only
//! rename the value in help output.

mod duration;
mod name;
mod value;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};

use tracing::trace;

use crate::error::{ConfigError, FlagError};

pub use duration::{format_duration, parse_duration};
pub use name::{flag_name, unquote_usage, FlagTag};
pub use value::{
    Bind, List, Map, Multiplicity, Optional, Primitive, Scalar, Shape, StringMap, Value, ValueKind,
};

/// Completion class for a flag's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgCompletion {
    /// Value completes as a file name.
    File,
    /// Value completes as a directory name.
    Dir,
    /// Free-form value; no suggestions.
    Words,
}

/// Static description of one declared flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub name: String,
    /// Usage text with placeholder brackets removed.
    pub usage: String,
    /// Placeholder taken from the usage text, if any.
    pub placeholder: Option<String>,
    pub kind: ValueKind,
    pub optional: bool,
    pub multiplicity: Multiplicity,
    /// Rendered default, or `None` when it equals the zero value.
    pub default: Option<String>,
    pub bool_flag: bool,
    pub hidden: bool,
}

impl FlagSpec {
    /// Completion class used for the value of this flag. Bool flags take no
    /// value and return `None`.
    pub fn completion(&self) -> Option<ArgCompletion> {
        if self.bool_flag {
            return None;
        }
        Some(match self.placeholder.as_deref() {
            Some("file") => ArgCompletion::File,
            Some("dir") => ArgCompletion::Dir,
            _ => ArgCompletion::Words,
        })
    }
}

struct FlagDef<'a> {
    tag: FlagTag,
    default: String,
    value: Box<dyn Value + 'a>,
}

/// The flags of one command instance, borrowed from its fields.
pub struct FlagSet<'a> {
    defs: BTreeMap<String, FlagDef<'a>>,
    actual: BTreeSet<String>,
}

impl Default for FlagSet<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> FlagSet<'a> {
    pub fn new() -> Self {
        Self {
            defs: BTreeMap::new(),
            actual: BTreeSet::new(),
        }
    }

    /// Declares a flag that writes to `field`.
    pub fn bind<B: Bind + ?Sized>(
        &mut self,
        tag: FlagTag,
        field: &'a mut B,
    ) -> Result<(), ConfigError> {
        self.insert(tag, field.bind())
    }

    /// Declares a flag backed by a custom [`Value`].
    pub fn var<V: Value + 'a>(&mut self, tag: FlagTag, value: V) -> Result<(), ConfigError> {
        self.insert(tag, Box::new(value))
    }

    fn insert(&mut self, tag: FlagTag, value: Box<dyn Value + 'a>) -> Result<(), ConfigError> {
        tag.validate()?;
        if self.defs.contains_key(&tag.name) {
            return Err(ConfigError::DuplicateFlag(tag.name));
        }
        trace!(flag = %tag.name, "flag bound");
        let default = value.get();
        self.defs.insert(
            tag.name.clone(),
            FlagDef {
                tag,
                default,
                value,
            },
        );
        Ok(())
    }

    /// Number of declared flags.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Whether the flag was set during [`parse`](Self::parse).
    pub fn is_set(&self, name: &str) -> bool {
        self.actual.contains(name)
    }

    /// Current value of a flag, rendered as text.
    pub fn get(&self, name: &str) -> Option<String> {
        self.defs.get(name).map(|d| d.value.get())
    }

    /// Parses flags from the front of `args` and returns the positionals.
    pub fn parse(&mut self, args: &[String]) -> Result<Vec<String>, FlagError> {
        let mut rest = args;
        while let Some((tok, tail)) = rest.split_first() {
            if tok.len() < 2 || !tok.starts_with('-') {
                break;
            }
            rest = tail;

            let body = match tok.strip_prefix("--") {
                Some("") => break,
                Some(b) => b,
                None => &tok[1..],
            };
            if body.is_empty() || body.starts_with('-') || body.starts_with('=') {
                return Err(FlagError::BadSyntax(tok.clone()));
            }
            let (name, inline) = match body.char_indices().skip(1).find(|&(_, c)| c == '=') {
                Some((i, _)) => (&body[..i], Some(&body[i + 1..])),
                None => (body, None),
            };

            let Some(def) = self.defs.get_mut(name) else {
                if name == "h" || name == "help" {
                    return Err(FlagError::Help);
                }
                return Err(FlagError::Undefined(name.to_string()));
            };

            if def.value.is_bool_flag() {
                let v = inline.unwrap_or("true");
                def.value.set(v).map_err(|e| FlagError::InvalidBool {
                    name: name.to_string(),
                    value: v.to_string(),
                    reason: e.to_string(),
                })?;
            } else {
                let v = match inline {
                    Some(v) => v,
                    None => {
                        let Some((next, tail)) = rest.split_first() else {
                            return Err(FlagError::MissingValue(name.to_string()));
                        };
                        rest = tail;
                        next.as_str()
                    }
                };
                def.value.set(v).map_err(|e| FlagError::InvalidValue {
                    name: name.to_string(),
                    value: v.to_string(),
                    reason: e.to_string(),
                })?;
            }
            trace!(flag = name, "flag set");
            self.actual.insert(name.to_string());
        }
        Ok(rest.to_vec())
    }

    /// Describes every declared flag, sorted by name.
    pub fn specs(&self) -> Vec<FlagSpec> {
        self.defs
            .values()
            .map(|def| {
                let (placeholder, usage) = unquote_usage(&def.tag.usage);
                let shape = def.value.shape();
                let default = (def.default != def.value.zero()).then(|| def.default.clone());
                FlagSpec {
                    name: def.tag.name.clone(),
                    usage,
                    placeholder: placeholder.map(str::to_string),
                    kind: shape.kind,
                    optional: shape.optional,
                    multiplicity: shape.multiplicity,
                    default,
                    bool_flag: def.value.is_bool_flag(),
                    hidden: def.tag.hidden,
                }
            })
            .collect()
    }

    /// Writes the help listing of all visible flags.
    ///
    /// Each entry is `  -name type`, followed by the usage on the same line
    /// after a tab when the head is short, or on the next line otherwise:
    ///
    /// ```text
    ///   -o file
    ///     	Write output to file
    ///   -v	Verbose output
    /// ```
    pub fn write_defaults(&self, w: &mut impl fmt::Write) -> fmt::Result {
        for spec in self.specs().iter().filter(|s| !s.hidden) {
            let mut line = format!("  -{}", spec.name);
            let type_name = spec
                .placeholder
                .as_deref()
                .unwrap_or_else(|| spec.kind.type_name());
            if !type_name.is_empty() {
                let _ = write!(line, " {type_name}");
            }
            if line.len() <= 4 {
                line.push('\t');
            } else {
                line.push_str("\n    \t");
            }
            line.push_str(&spec.usage.replace('\n', "\n    \t"));
            if let Some(default) = &spec.default {
                if spec.kind == ValueKind::String && spec.multiplicity == Multiplicity::Single {
                    let _ = write!(line, " (default {default:?})");
                } else {
                    let _ = write!(line, " (default {default})");
                }
            }
            writeln!(w, "{line}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FlagSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("flags", &self.defs.keys().collect::<Vec<_>>())
            .field("set", &self.actual)
            .finish()
    }
}
