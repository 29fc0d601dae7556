//! Drives the demo through `App::execute`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use arbor::complete::{compile, Reply};
use arbor_example::{app, tree, BIN, STORE_ENV};

fn run(tokens: &[&str]) -> (i32, String) {
    let mut out = Vec::new();
    let code = app().unwrap().execute(tokens, &mut out);
    (code, String::from_utf8(out).unwrap())
}

fn read_store(path: &Path) -> BTreeMap<String, String> {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn entries(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let file = path.to_str().unwrap();

    assert_eq!(run(&["config", "set", "-file", file, "color", "blue"]), (0, String::new()));
    assert_eq!(
        run(&["config", "put", "--file", file, "-D", "a=1", "-D=b=2=3"]),
        (0, String::new())
    );
    assert_eq!(
        read_store(&path),
        entries(&[("a", "1"), ("b", "2=3"), ("color", "blue")])
    );

    assert_eq!(run(&["config", "set", "-file", file, "-d", "a"]).0, 0);
    assert_eq!(read_store(&path), entries(&[("b", "2=3"), ("color", "blue")]));

    assert_eq!(run(&["config", "get", "-file", file, "color"]), (0, String::new()));
    // A missing key exits 1 without a message.
    assert_eq!(run(&["config", "get", "-file", file, "missing"]), (1, String::new()));
    assert_eq!(run(&["config", "ls", "-file", file, "-p", "c", "-json"]).0, 0);
}

#[test]
fn test_store_usage_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let file = path.to_str().unwrap();

    let (code, out) = run(&["config", "set", "-file", file, "key"]);
    assert_eq!(code, 2);
    assert!(
        out.starts_with("Error: expected a key and a value\nUsage: arbor-demo config "),
        "output:\n{out}"
    );

    let (code, out) = run(&["config", "set", "-file", file]);
    assert_eq!(code, 2);
    assert!(out.starts_with("Error: nothing to set\n"));

    let (code, out) = run(&["config", "get", "-file", file]);
    assert_eq!(code, 2);
    assert!(out.starts_with("Error: command requires 1 argument(s)\n"));

    assert!(!path.exists());

    fs::write(&path, "not json").unwrap();
    let (code, out) = run(&["config", "list", "-file", file]);
    assert_eq!(code, 1);
    assert!(out.starts_with("Error: failed to parse "), "output:\n{out}");
}

#[test]
fn test_store_from_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("env.json");
    std::env::set_var(STORE_ENV, &path);

    assert_eq!(run(&["config", "set", "k", "v"]), (0, String::new()));
    assert_eq!(read_store(&path), entries(&[("k", "v")]));
}

#[test]
fn test_greet() {
    assert_eq!(run(&["hi", "-n", "2", "-shout", "Ada"]), (0, String::new()));
    assert_eq!(run(&["greet"]), (0, String::new()));

    let (code, out) = run(&["greet", "-n", "0"]);
    assert_eq!(code, 2);
    assert!(out.starts_with("Error: -n must be at least 1\n"));

    let (code, out) = run(&["greet", "-delay", "soon"]);
    assert_eq!(code, 2);
    assert!(out.starts_with("Error: invalid value \"soon\" for flag -delay: "));

    let (code, out) = run(&["hi", "-h"]);
    assert_eq!(code, 0);
    assert!(out.contains(
        "Print a greeting for each name, or for the world.\n\nExamples:\n\tarbor-demo hi -n 2 Ada Grace\n"
    ));
}

#[test]
fn test_hidden_debug_command() {
    let help = app().unwrap().help::<&str>(&[]);
    assert!(help.contains("greet"));
    assert!(!help.contains("debug"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tables.json");
    assert_eq!(
        run(&["debug", "-o", path.to_str().unwrap()]),
        (0, String::new())
    );
    let tables: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(tables["bin"], BIN);
    assert_eq!(
        tables["cmds"][0]["words"],
        serde_json::json!(["completion", "config", "greet", "help"])
    );
}

#[test]
fn test_completion_script() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arbor-demo.bash");
    assert_eq!(
        run(&["completion", "-o", path.to_str().unwrap()]),
        (0, String::new())
    );
    let script = fs::read_to_string(&path).unwrap();
    assert!(script.starts_with("_arbor_demo() {\n"));
    assert!(script.contains("['0 greet']=1"));
    assert!(script.contains("['0 hi']=1"));
    assert!(!script.contains("debug"));
    assert!(script.ends_with("complete -F _arbor_demo arbor-demo\n"));
}

#[test]
fn test_completion_replies() {
    let spec = compile(&tree().unwrap(), BIN).unwrap();
    let words = |list: &[&str], fallback| Reply::Words {
        words: list.iter().map(|s| s.to_string()).collect(),
        fallback,
    };

    assert_eq!(
        spec.complete(&["config", ""]),
        words(&["get", "help", "list", "set"], false)
    );
    assert_eq!(spec.complete(&["config", "put", "-f"]), words(&["-file"], true));
    assert_eq!(
        spec.complete(&["config", "ls", "-file", "st"]),
        Reply::Files("st".into())
    );
    assert_eq!(spec.complete(&["hi", "-delay", ""]), words(&[], false));
    assert_eq!(spec.complete(&["debug", ""]), Reply::Nothing);
}
