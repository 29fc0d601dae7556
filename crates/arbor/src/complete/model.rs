//! What the generated script does, evaluated in Rust over the same tables.

use super::CompletionSpec;
use crate::flags::ArgCompletion;
use crate::tree::{resolve_token, Step};

/// Where the script's walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Index into [`CompletionSpec::cmds`].
    pub node: usize,
    /// Number of words consumed, including help and empty words.
    pub consumed: usize,
    pub help: bool,
}

/// Candidates offered for the word under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The script returns without completing.
    Nothing,
    /// Words starting with the current prefix. With `fallback`, bash default
    /// completion is used when the list is empty.
    Words { words: Vec<String>, fallback: bool },
    /// File names starting with the prefix.
    Files(String),
    /// Directory names starting with the prefix.
    Dirs(String),
}

impl CompletionSpec {
    /// Walks `words` (the words before the cursor, program name excluded).
    ///
    /// Returns `None` where the script gives up: at a word that names no
    /// visible child.
    pub fn walk<S: AsRef<str>>(&self, words: &[S]) -> Option<Position> {
        let mut pos = Position {
            node: 0,
            consumed: 0,
            help: false,
        };
        for word in words {
            let cmd = self.cmds.get(pos.node)?;
            if cmd.leaf {
                break;
            }
            match resolve_token(word.as_ref(), |w| cmd.children.get(w).copied()) {
                Step::Help => pos.help = true,
                Step::Skip => {}
                Step::Child(child) => pos.node = child,
                Step::Unknown => return None,
            }
            pos.consumed += 1;
        }
        Some(pos)
    }

    /// Completes the last element of `line`, the words after the program
    /// name. An empty `line` completes an empty word.
    pub fn complete<S: AsRef<str>>(&self, line: &[S]) -> Reply {
        let (cur, before) = match line.split_last() {
            Some((cur, before)) => (cur.as_ref(), before),
            None => ("", line),
        };
        let Some(pos) = self.walk(before) else {
            return Reply::Nothing;
        };
        let Some(cmd) = self.cmds.get(pos.node) else {
            return Reply::Nothing;
        };

        if cmd.leaf {
            if pos.help {
                return Reply::Nothing;
            }
            let prev: Option<&str> = before.last().map(|w| w.as_ref());
            let target = match prev.and_then(flag_name) {
                Some(name) => Some((name, cur)),
                None => assigned_flag(cur),
            };
            if let Some(class) = target.and_then(|(name, _)| cmd.args.get(name)) {
                let value = target.map_or(cur, |(_, value)| value);
                return match class {
                    ArgCompletion::File => Reply::Files(value.to_string()),
                    ArgCompletion::Dir => Reply::Dirs(value.to_string()),
                    ArgCompletion::Words => Reply::Words {
                        words: Vec::new(),
                        fallback: false,
                    },
                };
            }
        }

        Reply::Words {
            words: cmd
                .words
                .iter()
                .filter(|w| w.starts_with(cur))
                .cloned()
                .collect(),
            fallback: cmd.bashdefault,
        }
    }
}

/// Flag name of a whole `-name` or `--name` word.
fn flag_name(word: &str) -> Option<&str> {
    let name = strip_dashes(word)?;
    valid_name(name).then_some(name)
}

/// Flag name and value of a `-name=value` word.
fn assigned_flag(word: &str) -> Option<(&str, &str)> {
    let (name, value) = strip_dashes(word)?.split_once('=')?;
    valid_name(name).then_some((name, value))
}

fn strip_dashes(word: &str) -> Option<&str> {
    let rest = word.strip_prefix('-')?;
    Some(rest.strip_prefix('-').unwrap_or(rest))
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complete::compile;
    use crate::error::ConfigError;
    use crate::flags::FlagSet;
    use crate::tree::{Info, TreeBuilder};
    use crate::{Command, FlagTag, Flags};

    #[derive(Default)]
    struct Run {
        verbose: bool,
        out: String,
        dir: String,
        tag: String,
    }

    impl Flags for Run {
        fn define_flags<'a>(&'a mut self, set: &mut FlagSet<'a>) -> Result<(), ConfigError> {
            set.bind(FlagTag::new("v", "Verbose"), &mut self.verbose)?;
            set.bind(FlagTag::new("o", "Output {file}"), &mut self.out)?;
            set.bind(FlagTag::new("dir", "Work <dir>"), &mut self.dir)?;
            set.bind(FlagTag::new("tag", "Tag"), &mut self.tag)
        }
    }

    impl Command for Run {
        fn run(&mut self, _args: Vec<String>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn spec() -> CompletionSpec {
        let mut b = TreeBuilder::new();
        let g = b.add(b.root(), Info::new("group|g")).unwrap();
        b.add(g, Info::new("run").args(1, 2).command(Run::default))
            .unwrap();
        b.add(b.root(), Info::new("hidden").hidden()).unwrap();
        compile(&b.build().unwrap(), "bin").unwrap()
    }

    fn words(list: &[&str], fallback: bool) -> Reply {
        Reply::Words {
            words: list.iter().map(|s| s.to_string()).collect(),
            fallback,
        }
    }

    #[test]
    fn test_walk() {
        let spec = spec();
        let run = spec.get(&["group", "run"]).unwrap();
        let pos = spec.walk(&["g", "", "-h", "run", "x"]).unwrap();
        assert_eq!(spec.cmds[pos.node], *run);
        assert_eq!(pos.consumed, 4);
        assert!(pos.help);
        assert_eq!(spec.walk(&["bogus"]), None);
        assert_eq!(spec.walk(&["hidden"]), None);
        assert_eq!(spec.walk::<&str>(&[]).map(|p| p.node), Some(0));
    }

    #[test]
    fn test_complete_commands() {
        let spec = spec();
        assert_eq!(spec.complete::<&str>(&[]), words(&["group", "help"], false));
        // Aliases resolve but are not offered.
        assert_eq!(spec.complete(&["g"]), words(&["group"], false));
        assert_eq!(spec.complete(&["g", ""]), words(&["help", "run"], false));
        assert_eq!(spec.complete(&["nope", ""]), Reply::Nothing);
    }

    #[test]
    fn test_complete_flags() {
        let spec = spec();
        assert_eq!(
            spec.complete(&["g", "run", "-"]),
            words(&["-dir", "-o", "-tag", "-v"], true)
        );
        assert_eq!(spec.complete(&["g", "run", "-o", "ab"]), Reply::Files("ab".into()));
        assert_eq!(spec.complete(&["g", "run", "--dir", ""]), Reply::Dirs("".into()));
        assert_eq!(spec.complete(&["g", "run", "-o=ab"]), Reply::Files("ab".into()));
        assert_eq!(
            spec.complete(&["g", "run", "-tag", "x"]),
            words(&[], false)
        );
        assert_eq!(
            spec.complete(&["g", "run", "-v", "-"]),
            words(&["-dir", "-o", "-tag", "-v"], true)
        );
    }

    #[test]
    fn test_previous_flag_suppresses_assignment() {
        let spec = spec();
        // "-v" is flag-shaped, so "-o=x" is not read as a value for -o.
        assert_eq!(spec.complete(&["g", "run", "-v", "-o=x"]), words(&[], true));
    }

    #[test]
    fn test_help_on_leaf() {
        let spec = spec();
        assert_eq!(spec.complete(&["help", "g", "run", "-"]), Reply::Nothing);
        assert_eq!(
            spec.complete(&["help", "g", ""]),
            words(&["help", "run"], false)
        );
    }

    #[test]
    fn test_flag_shapes() {
        assert_eq!(flag_name("-v"), Some("v"));
        assert_eq!(flag_name("--dry-run"), Some("dry-run"));
        assert_eq!(flag_name("---x"), None);
        assert_eq!(flag_name("-"), None);
        assert_eq!(flag_name("x"), None);
        assert_eq!(assigned_flag("-o=a=b"), Some(("o", "a=b")));
        assert_eq!(assigned_flag("--o="), Some(("o", "")));
        assert_eq!(assigned_flag("-=x"), None);
    }
}
