//! `arbor-demo`: a small CLI built on arbor.
//!
//! It greets people, keeps a JSON-backed key/value store and can print a
//! bash completion script for itself.
//!
//! ```text
//! arbor-demo greet|hi [name ...]
//! arbor-demo config get <key>
//! arbor-demo config set|put [key value]
//! arbor-demo config list|ls
//! arbor-demo completion [-o file] [-json]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use arbor::complete::compile;
use arbor::{App, Command, CommandTree, ConfigError, ExitCode, Flags, Info, TreeBuilder, UsageError};
use tracing::debug;

/// Program name used in usage lines and the completion script.
pub const BIN: &str = "arbor-demo";

/// Environment variable naming the store file when `-file` is not given.
pub const STORE_ENV: &str = "ARBOR_DEMO_STORE";

/// Environment variable that turns on verbose error reports.
pub const DEBUG_ENV: &str = "ARBOR_DEMO_DEBUG";

const DEFAULT_STORE: &str = "arbor-demo.json";

/// Builds the command tree.
pub fn tree() -> Result<CommandTree, ConfigError> {
    let mut b = TreeBuilder::new();
    let root = b.root();

    b.add(
        root,
        Info::new("greet|hi")
            .summary("Print a greeting")
            .usage("[name ...]")
            .variadic(0)
            .command(|| Greet {
                greeting: "Hello".into(),
                times: 1,
                ..Greet::default()
            }),
    )?;

    let config = b.add(root, Info::new("config").summary("Read and write stored settings"))?;
    b.add(
        config,
        Info::new("get")
            .summary("Print one value")
            .usage("<key>")
            .args(1, 1)
            .command(Get::default),
    )?;
    b.add(
        config,
        Info::new("set|put")
            .summary("Store values")
            .usage("[key value]")
            .args(0, 2)
            .command(Set::default),
    )?;
    b.add(
        config,
        Info::new("list|ls")
            .summary("Print all values")
            .command(List::default),
    )?;

    b.add(
        root,
        Info::new("completion")
            .summary("Print the bash completion script")
            .command(Completion::default),
    )?;
    b.add(
        root,
        Info::new("debug")
            .summary("Dump completion tables")
            .hidden()
            .command(|| Completion {
                json: true,
                ..Completion::default()
            }),
    )?;

    b.build()
}

/// Builds the app, reading verbose mode from [`DEBUG_ENV`].
pub fn app() -> Result<App, ConfigError> {
    Ok(App::builder()
        .bin(BIN)
        .verbose_from_env(DEBUG_ENV)
        .build(tree()?))
}

// ============================================================================
// greet
// ============================================================================

#[derive(Default, Flags)]
struct Greet {
    #[flag("Greeting to use")]
    greeting: String,
    #[flag("n,Repeat {count} times")]
    times: u32,
    #[flag("Print in upper case")]
    shout: bool,
    #[flag("Wait {duration} before greeting")]
    delay: Option<Duration>,
}

impl Command for Greet {
    fn run(&mut self, args: Vec<String>) -> anyhow::Result<()> {
        if self.times == 0 {
            return Err(UsageError::new("-n must be at least 1").into());
        }
        if let Some(delay) = self.delay {
            debug!(?delay, "waiting");
            thread::sleep(delay);
        }
        let names = if args.is_empty() {
            vec!["world".to_string()]
        } else {
            args
        };
        for name in &names {
            let mut line = format!("{}, {name}!", self.greeting);
            if self.shout {
                line = line.to_uppercase();
            }
            for _ in 0..self.times {
                println!("{line}");
            }
        }
        Ok(())
    }

    fn help(&self) -> Option<String> {
        Some(
            "
			Print a greeting for each name, or for the world.

			Examples:
				arbor-demo hi -n 2 Ada Grace
				arbor-demo greet -greeting=Hey -shout
			"
            .to_string(),
        )
    }
}

// ============================================================================
// config
// ============================================================================

type Entries = BTreeMap<String, String>;

/// Location of the JSON store, shared by the `config` commands.
#[derive(Default, Flags)]
struct Store {
    #[flag("Use {file} as the store")]
    file: PathBuf,
}

impl Store {
    fn path(&self) -> PathBuf {
        if !self.file.as_os_str().is_empty() {
            return self.file.clone();
        }
        std::env::var_os(STORE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE))
    }

    fn load(&self) -> anyhow::Result<Entries> {
        let path = self.path();
        match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "store missing, starting empty");
                Ok(Entries::new())
            }
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn save(&self, entries: &Entries) -> anyhow::Result<()> {
        let path = self.path();
        let mut text = serde_json::to_string_pretty(entries)?;
        text.push('\n');
        fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), entries = entries.len(), "store saved");
        Ok(())
    }
}

#[derive(Default, Flags)]
struct Get {
    #[flag(flatten)]
    store: Store,
}

impl Command for Get {
    fn run(&mut self, args: Vec<String>) -> anyhow::Result<()> {
        let entries = self.store.load()?;
        match entries.get(&args[0]) {
            Some(value) => {
                println!("{value}");
                Ok(())
            }
            None => Err(ExitCode(1).into()),
        }
    }
}

#[derive(Default, Flags)]
struct Set {
    #[flag(flatten)]
    store: Store,
    #[flag("D,Also set {key=value}")]
    defines: Entries,
    #[flag("d,Remove {key}")]
    delete: Vec<String>,
}

impl Command for Set {
    fn run(&mut self, args: Vec<String>) -> anyhow::Result<()> {
        if args.len() == 1 {
            return Err(UsageError::new("expected a key and a value").into());
        }
        if args.is_empty() && self.defines.is_empty() && self.delete.is_empty() {
            return Err(UsageError::new("nothing to set").into());
        }

        let mut entries = self.store.load()?;
        for key in &self.delete {
            entries.remove(key);
        }
        entries.append(&mut self.defines);
        if let [key, value] = args.as_slice() {
            entries.insert(key.clone(), value.clone());
        }
        self.store.save(&entries)
    }
}

#[derive(Default, Flags)]
struct List {
    #[flag(flatten)]
    store: Store,
    #[flag("p,Only keys starting with {prefix}")]
    prefix: Vec<String>,
    #[flag("Print as a JSON object")]
    json: bool,
}

impl Command for List {
    fn run(&mut self, _args: Vec<String>) -> anyhow::Result<()> {
        let mut entries = self.store.load()?;
        if !self.prefix.is_empty() {
            entries.retain(|key, _| self.prefix.iter().any(|p| key.starts_with(p.as_str())));
        }
        if self.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            for (key, value) in &entries {
                println!("{key}={value}");
            }
        }
        Ok(())
    }
}

// ============================================================================
// completion
// ============================================================================

#[derive(Default, Flags)]
struct Completion {
    #[flag("o,Write to {file} instead of stdout")]
    out: PathBuf,
    #[flag("Print the completion tables as JSON")]
    json: bool,
}

impl Command for Completion {
    fn run(&mut self, _args: Vec<String>) -> anyhow::Result<()> {
        let spec = compile(&tree()?, BIN)?;
        let text = if self.json {
            spec.to_json()? + "\n"
        } else {
            spec.render()?
        };
        if self.out.as_os_str().is_empty() {
            print!("{text}");
        } else {
            fs::write(&self.out, text)
                .with_context(|| format!("failed to write {}", self.out.display()))?;
        }
        Ok(())
    }

    fn help(&self) -> Option<String> {
        Some(
            "
			Print a bash completion script (bash 4 or newer).

			Load it in the current shell with:
				source <(arbor-demo completion)
			"
            .to_string(),
        )
    }
}
