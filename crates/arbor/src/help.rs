//! Usage and help text.
//!
//! Help for a node has up to three parts: the usage lines, a description
//! (the command's own help text or its one-line summary) and either the list
//! of sub-commands or the flag listing.
//!
//! ```text
//! Usage: bin {c2|c} usage
//!        bin {c2|c} help
//!
//! Command help.
//!
//! Options:
//!   -opt string
//!     	Option description
//! ```

use std::fmt::{self, Write as _};

use console::measure_text_width;
use tracing::warn;

use crate::flags::FlagSet;
use crate::tree::Node;

/// Text buffer with paragraph-aware helpers.
#[derive(Debug, Default, Clone)]
pub struct HelpWriter {
    buf: String,
}

impl HelpWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new paragraph, separated from existing text by one blank
    /// line, with an optional `Name:` heading.
    pub fn section(&mut self, name: &str) {
        if !self.buf.is_empty() && !self.buf.ends_with("\n\n") {
            self.buf
                .push_str(if self.buf.ends_with('\n') { "\n" } else { "\n\n" });
        }
        if !name.is_empty() {
            self.buf.push_str(name);
            self.buf.push_str(":\n");
        }
    }

    /// Appends `s` as a paragraph with tab indentation and surrounding
    /// whitespace removed.
    pub fn text(&mut self, s: &str) {
        self.section("");
        self.buf.push_str(dedent(s).trim());
        self.buf.push('\n');
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl fmt::Write for HelpWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.push_str(s);
        Ok(())
    }
}

/// Removes leading tabs from every line of `s`.
///
/// The first line is left alone; the first later line that contains anything
/// besides tabs sets how many tabs are removed from each line after the
/// first. This lets help text be written as an indented raw string:
///
/// ```
/// use arbor::dedent;
///
/// let s = "
/// \t\tFirst line.
/// \t\t\tIndented.
/// \t";
/// assert_eq!(dedent(s), "\nFirst line.\n\tIndented.\n");
/// ```
pub fn dedent(s: &str) -> String {
    let Some(first_nl) = s.find('\n') else {
        return s.to_string();
    };
    let depth = s[first_nl + 1..]
        .split('\n')
        .find(|line| line.bytes().any(|b| b != b'\t'))
        .map_or(0, |line| line.bytes().take_while(|&b| b == b'\t').count());
    if depth == 0 {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..=first_nl]);
    let mut lines = s[first_nl + 1..].split('\n').peekable();
    while let Some(line) = lines.next() {
        let tabs = line.bytes().take(depth).take_while(|&b| b == b'\t').count();
        out.push_str(&line[tabs..]);
        if lines.peek().is_some() {
            out.push('\n');
        }
    }
    out
}

/// Number of `true` values, for checking mutually exclusive flags.
///
/// ```
/// assert_eq!(arbor::sum(&[true, false, true]), 2);
/// ```
pub fn sum(values: &[bool]) -> usize {
    values.iter().filter(|&&v| v).count()
}

/// Writes the usage lines of `node`.
pub fn write_usage(w: &mut HelpWriter, node: Node<'_>, bin: &str) {
    let name = node.full_name(bin);
    let usage = node.usage();
    if node.is_group() {
        let usage = if usage.is_empty() {
            "<command> [options] ..."
        } else {
            usage
        };
        let _ = writeln!(w, "Usage: {name} {usage}");
        let _ = writeln!(w, "       {name} <command> help");
        let _ = writeln!(w, "       {name} help [command]");
    } else {
        let sp = if usage.is_empty() { "" } else { " " };
        let _ = writeln!(w, "Usage: {name}{sp}{usage}");
        let _ = writeln!(w, "       {name} help");
    }
}

/// Writes visible children with their summaries, names padded to a column.
pub fn write_commands(w: &mut HelpWriter, node: Node<'_>) {
    let children = node.visible_children();
    let width = children
        .iter()
        .map(|c| measure_text_width(c.primary_name()))
        .max()
        .unwrap_or(0);
    for child in children {
        let name = child.primary_name();
        if child.summary().is_empty() {
            let _ = writeln!(w, "  {name}");
        } else {
            let pad = width - measure_text_width(name);
            let _ = writeln!(w, "  {name}{:pad$}  {}", "", child.summary());
        }
    }
}

/// Full help text for `node`.
pub fn render_help(node: Node<'_>, bin: &str) -> String {
    let mut w = HelpWriter::new();
    write_usage(&mut w, node, bin);

    let mut command = node.instantiate();
    if let Some(text) = command.help() {
        w.text(&text);
    } else if !node.summary().is_empty() {
        let _ = writeln!(w, "\n{}.", node.summary());
    }

    if node.is_group() {
        if !node.visible_children().is_empty() {
            w.section("Commands");
            write_commands(&mut w, node);
        }
    } else {
        let mut options = String::new();
        let mut set = FlagSet::new();
        match command.define_flags(&mut set) {
            Ok(()) => {
                let _ = set.write_defaults(&mut options);
            }
            Err(error) => {
                warn!(
                    command = %node.full_name(bin),
                    %error,
                    "invalid flag schema, options omitted"
                );
            }
        }
        if !options.is_empty() {
            w.section("Options");
            w.buf.push_str(&options);
        }
    }
    w.into_string()
}

/// `Error: <msg>` followed by the usage of `node`.
pub fn render_error(node: Node<'_>, bin: &str, msg: &str) -> String {
    let mut w = HelpWriter::new();
    let _ = writeln!(w, "Error: {}", msg.trim());
    write_usage(&mut w, node, bin);
    w.into_string()
}

/// Output for running a node that has no implementation: the list of
/// sub-commands for groups, a short notice for leaves.
pub fn render_unimplemented(node: Node<'_>) -> String {
    let mut w = HelpWriter::new();
    if node.is_group() {
        w.section("Specify command");
        write_commands(&mut w, node);
    } else {
        w.buf.push_str("Command not implemented\n");
    }
    w.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::error::ConfigError;
    use crate::tree::{Info, TreeBuilder};
    use crate::{Command, FlagTag, Flags};

    #[test]
    fn test_dedent_pass_through() {
        let cases = [
            "",
            "A",
            "\t",
            "\tA",
            "\n",
            "\nA",
            "A\nB",
            "\t\n",
            "\t\nA",
            "\t\n\t",
            "\n\t\n",
            "\n\t\n\t",
            "\n\t\t\nA",
            "\n\t\nA\n\tB",
            "\t\n\t\t\nA\n\tB\n",
        ];
        for s in cases {
            assert_eq!(dedent(s), s, "input {s:?}");
        }
    }

    #[test]
    fn test_dedent() {
        let cases = [
            ("\n\tA", "\nA"),
            ("\t\n\tA", "\t\nA"),
            ("\n\n\tA", "\n\nA"),
            ("\n\tA\nB", "\nA\nB"),
            ("\nA\n\tB", "\nA\n\tB"),
            ("\n\tA\n\t\tB", "\nA\n\tB"),
            ("\n\t\t\n\tA\n", "\n\t\nA\n"),
            ("A\n\t\tB\nC\n\tD\n\t\t\tE\n\t", "A\nB\nC\nD\n\tE\n"),
        ];
        for (input, want) in cases {
            assert_eq!(dedent(input), want, "input {input:?}");
        }
    }

    #[test]
    fn test_section_spacing() {
        let mut w = HelpWriter::new();
        w.section("First");
        assert_eq!(w.as_str(), "First:\n");
        w.section("Second");
        assert_eq!(w.as_str(), "First:\n\nSecond:\n");
        let _ = write!(w, "no newline");
        w.section("");
        assert_eq!(w.as_str(), "First:\n\nSecond:\nno newline\n\n");
        w.text("\n\t\tIndented text.\n\n\n");
        assert_eq!(
            w.as_str(),
            "First:\n\nSecond:\nno newline\n\nIndented text.\n"
        );
    }

    #[test]
    fn test_sum() {
        assert_eq!(sum(&[]), 0);
        assert_eq!(sum(&[false, false]), 0);
        assert_eq!(sum(&[true, false, true, true]), 3);
    }

    /// Declares a duplicate flag when `broken` is set.
    #[derive(Default)]
    struct Flaky {
        broken: bool,
        a: bool,
        b: bool,
    }

    impl Flags for Flaky {
        fn define_flags<'a>(&'a mut self, set: &mut FlagSet<'a>) -> Result<(), ConfigError> {
            set.bind(FlagTag::new("x", "First"), &mut self.a)?;
            if self.broken {
                set.bind(FlagTag::new("x", "Second"), &mut self.b)?;
            }
            Ok(())
        }
    }

    impl Command for Flaky {
        fn run(&mut self, _args: Vec<String>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_schema_error_is_logged() {
        // The first instance passes the check in build(); later ones fail.
        let calls = Arc::new(AtomicUsize::new(0));
        let mut b = TreeBuilder::new();
        b.add(
            b.root(),
            Info::new("flaky").command(move || Flaky {
                broken: calls.fetch_add(1, Ordering::SeqCst) > 0,
                ..Flaky::default()
            }),
        )
        .unwrap();
        let tree = b.build().unwrap();
        let node = tree.node(tree.root()).child("flaky").unwrap();

        let logs = Capture::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let help = tracing::subscriber::with_default(subscriber, || render_help(node, "bin"));

        assert_eq!(help, "Usage: bin flaky\n       bin flaky help\n");
        let logs = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("WARN"), "logs:\n{logs}");
        assert!(logs.contains("invalid flag schema, options omitted"), "logs:\n{logs}");
        assert!(logs.contains("command=bin flaky"), "logs:\n{logs}");
    }
}
