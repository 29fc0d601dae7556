//! Application runner.
//!
//! [`App`] owns a [`CommandTree`] and turns a command line into an exit
//! status: it parses, runs the command, and reports the result.
//!
//! | result | output | status |
//! |--------|--------|--------|
//! | success | none | 0 |
//! | help requested | help text | 0 |
//! | [`UsageError`] | `Error: msg` and usage | 2 |
//! | [`ExitCode`]`(n)` | none | n |
//! | [`Unimplemented`] | command list or notice | 2 |
//! | any other error | `Error: msg` | 1 |
//! | panic while rendering | `panic: msg` and backtrace | 2 |
//!
//! ```rust,no_run
//! use arbor::{App, Info, TreeBuilder};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut tree = TreeBuilder::new();
//!     tree.add(tree.root(), Info::new("serve").summary("Start the server"))?;
//!
//!     App::builder()
//!         .bin("demo")
//!         .verbose_from_env("DEMO_DEBUG")
//!         .build(tree.build()?)
//!         .run();
//!     Ok(())
//! }
//! ```

use std::any::Any;
use std::backtrace::Backtrace;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};

use crate::command::Unimplemented;
use crate::dispatch::Outcome;
use crate::error::{ExitCode, HelpRequested, UsageError};
use crate::flags::Primitive;
use crate::help::{render_error, render_help, render_unimplemented};
use crate::tree::{CommandTree, Node};

/// Process termination strategy.
pub type ExitFn = Box<dyn Fn(i32) + Send + Sync>;

/// A command tree ready to run.
pub struct App {
    tree: CommandTree,
    bin: String,
    verbose: bool,
    exit: ExitFn,
}

impl App {
    /// Creates a new builder for constructing an App instance.
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Program name used in usage lines.
    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Help text for the node that `tokens` resolve to.
    pub fn help<S: AsRef<str>>(&self, tokens: &[S]) -> String {
        let node = self.tree.node(self.tree.walk(tokens).node);
        render_help(node, &self.bin)
    }

    /// Runs the command line from the process arguments, writes diagnostics
    /// to stderr and terminates through the exit strategy.
    pub fn run(&self) {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let code = self.execute(&args, &mut io::stderr());
        debug!(code, "exiting");
        (self.exit)(code);
    }

    /// Parses and runs `tokens` (program name excluded), writing help and
    /// error text to `out`. Returns the exit status.
    pub fn execute<S: AsRef<str>>(&self, tokens: &[S], out: &mut dyn Write) -> i32 {
        let parsed = self.tree.parse(tokens);
        let node = parsed.node;
        match parsed.outcome {
            Outcome::Help => return self.emit(out, 0, || render_help(node, &self.bin)),
            Outcome::Usage(msg) => {
                return self.emit(out, 2, || render_error(node, &self.bin, &msg));
            }
            Outcome::Ok => {}
        }

        let mut command = parsed.command;
        match command.run(parsed.args) {
            Ok(()) => 0,
            Err(err) => self.report(node, err, out),
        }
    }

    /// Maps a command error to output and an exit status.
    fn report(&self, node: Node<'_>, err: anyhow::Error, out: &mut dyn Write) -> i32 {
        if let Some(usage) = err.downcast_ref::<UsageError>() {
            return self.emit(out, 2, || render_error(node, &self.bin, &usage.0));
        }
        if err.is::<HelpRequested>() {
            return self.emit(out, 0, || render_help(node, &self.bin));
        }
        if let Some(&ExitCode(code)) = err.downcast_ref::<ExitCode>() {
            debug!(code, "command requested exit code");
            return code;
        }
        if err.is::<Unimplemented>() {
            return self.emit(out, 2, || render_unimplemented(node));
        }
        let text = if self.verbose {
            format!("Error: {err:?}\n")
        } else {
            format!("Error: {err}\n")
        };
        self.emit(out, 1, || text)
    }

    /// Writes rendered text to `out`. A panic inside `render` is reported
    /// in place of the text.
    fn emit(&self, out: &mut dyn Write, code: i32, render: impl FnOnce() -> String) -> i32 {
        let (text, code) = match panic::catch_unwind(AssertUnwindSafe(render)) {
            Ok(text) => (text, code),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                warn!(%msg, "panic while rendering output");
                let trace = Backtrace::force_capture();
                (format!("panic: {msg}\n\n{trace}\n"), 2)
            }
        };
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!(error = %e, "failed to write output");
        }
        code
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Builder for [`App`].
pub struct AppBuilder {
    bin: Option<String>,
    verbose: bool,
    exit: Option<ExitFn>,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            bin: None,
            verbose: false,
            exit: None,
        }
    }

    /// Program name shown in usage lines. Defaults to the file name of the
    /// running executable.
    pub fn bin(mut self, name: impl Into<String>) -> Self {
        self.bin = Some(name.into());
        self
    }

    /// Prints the full error chain (and backtrace, when captured) for
    /// command failures.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets verbose mode from an environment variable. A variable that is set
    /// but empty enables it; any other value is read as a boolean, and
    /// unparsable values disable it. An unset variable changes nothing.
    pub fn verbose_from_env(mut self, key: &str) -> Self {
        if let Ok(value) = std::env::var(key) {
            self.verbose = value.is_empty() || bool::parse(&value).unwrap_or(false);
        }
        self
    }

    /// Replaces `std::process::exit` as the termination strategy of
    /// [`App::run`].
    pub fn on_exit(mut self, exit: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.exit = Some(Box::new(exit));
        self
    }

    pub fn build(self, tree: CommandTree) -> App {
        let bin = self.bin.unwrap_or_else(default_bin);
        debug!(%bin, verbose = self.verbose, "app configured");
        App {
            tree,
            bin,
            verbose: self.verbose,
            exit: self.exit.unwrap_or_else(|| Box::new(process_exit)),
        }
    }
}

fn process_exit(code: i32) {
    std::process::exit(code)
}

fn default_bin() -> String {
    std::env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::flags::FlagSet;
    use crate::tree::{Info, TreeBuilder};
    use crate::{Command, Flags};

    #[derive(Clone, Copy)]
    enum Mode {
        Ok,
        Usage,
        Help,
        Exit(i32),
        Fail,
    }

    struct Fixed(Mode);

    impl Flags for Fixed {
        fn define_flags<'a>(&'a mut self, _set: &mut FlagSet<'a>) -> Result<(), ConfigError> {
            Ok(())
        }
    }

    impl Command for Fixed {
        fn run(&mut self, _args: Vec<String>) -> anyhow::Result<()> {
            match self.0 {
                Mode::Ok => Ok(()),
                Mode::Usage => Err(UsageError::new("usage error").into()),
                Mode::Help => Err(HelpRequested.into()),
                Mode::Exit(n) => Err(ExitCode(n).into()),
                Mode::Fail => Err(anyhow::anyhow!("fail").context("outer")),
            }
        }
    }

    fn app(verbose: bool) -> App {
        let mut b = TreeBuilder::new();
        let root = b.root();
        for (name, mode) in [
            ("ok", Mode::Ok),
            ("usage", Mode::Usage),
            ("help", Mode::Help),
            ("exit", Mode::Exit(42)),
            ("fail", Mode::Fail),
        ] {
            b.add(root, Info::new(format!("{name}-cmd")).command(move || Fixed(mode)))
                .unwrap();
        }
        let g = b.add(root, Info::new("g")).unwrap();
        b.add(g, Info::new("c1")).unwrap();
        b.add(g, Info::new("c2").summary("Command 2")).unwrap();
        App::builder()
            .bin("bin")
            .verbose(verbose)
            .build(b.build().unwrap())
    }

    fn exec(app: &App, tokens: &[&str]) -> (i32, String) {
        let mut out = Vec::new();
        let code = app.execute(tokens, &mut out);
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_success_is_silent() {
        assert_eq!(exec(&app(false), &["ok-cmd"]), (0, String::new()));
    }

    #[test]
    fn test_usage_error_from_command() {
        let (code, out) = exec(&app(false), &["usage-cmd"]);
        assert_eq!(code, 2);
        assert_eq!(
            out,
            "Error: usage error\nUsage: bin usage-cmd\n       bin usage-cmd help\n"
        );
    }

    #[test]
    fn test_help_requested_from_command() {
        let (code, out) = exec(&app(false), &["help-cmd"]);
        assert_eq!(code, 0);
        assert_eq!(out, "Usage: bin help-cmd\n       bin help-cmd help\n");
    }

    #[test]
    fn test_exit_code_is_silent() {
        assert_eq!(exec(&app(false), &["exit-cmd"]), (42, String::new()));
    }

    #[test]
    fn test_other_error() {
        assert_eq!(
            exec(&app(false), &["fail-cmd"]),
            (1, "Error: outer\n".to_string())
        );
        let (code, out) = exec(&app(true), &["fail-cmd"]);
        assert_eq!(code, 1);
        assert!(out.starts_with("Error: outer\n\nCaused by:\n    fail"), "output:\n{out}");
    }

    #[test]
    fn test_placeholders() {
        let (code, out) = exec(&app(false), &["g"]);
        assert_eq!(code, 2);
        assert_eq!(out, "Specify command:\n  c1\n  c2  Command 2\n");

        let (code, out) = exec(&app(false), &["g", "c1"]);
        assert_eq!(code, 2);
        assert_eq!(out, "Command not implemented\n");
    }

    #[test]
    fn test_dispatch_outcomes() {
        let (code, out) = exec(&app(false), &["bogus"]);
        assert_eq!(code, 2);
        assert!(out.starts_with("Error: unknown command \"bogus\"\nUsage: bin <command>"));

        let (code, out) = exec(&app(false), &["ok-cmd", "extra"]);
        assert_eq!(code, 2);
        assert!(out.starts_with("Error: command does not accept any arguments\n"));

        let (code, out) = exec(&app(false), &["g", "help"]);
        assert_eq!(code, 0);
        assert!(out.starts_with("Usage: bin g <command> [options] ...\n"));
    }

    #[test]
    fn test_panic_while_rendering() {
        let app = app(false);
        let mut out = Vec::new();
        let code = app.emit(&mut out, 0, || panic!("boom"));
        let out = String::from_utf8(out).unwrap();
        assert_eq!(code, 2);
        assert!(out.starts_with("panic: boom\n\n"), "output:\n{out}");
    }

    #[test]
    fn test_verbose_from_env() {
        std::env::set_var("ARBOR_APP_TEST_EMPTY", "");
        std::env::set_var("ARBOR_APP_TEST_TRUE", "t");
        std::env::set_var("ARBOR_APP_TEST_JUNK", "maybe");

        let verbose = |key: &str, start: bool| {
            App::builder()
                .verbose(start)
                .verbose_from_env(key)
                .build(TreeBuilder::new().build().unwrap())
                .is_verbose()
        };
        assert!(verbose("ARBOR_APP_TEST_EMPTY", false));
        assert!(verbose("ARBOR_APP_TEST_TRUE", false));
        assert!(!verbose("ARBOR_APP_TEST_JUNK", true));
        assert!(verbose("ARBOR_APP_TEST_UNSET", true));
        assert!(!verbose("ARBOR_APP_TEST_UNSET", false));
    }
}
