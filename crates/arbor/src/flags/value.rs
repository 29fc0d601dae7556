//! Typed flag values.
//!
//! [`Value`] is the dynamic interface the parser talks to. [`Bind`] connects a
//! field type to a `Value` that writes through to the field, so a command
//! struct is updated in place while flags are parsed.
//!
//! Every supported field type has a `Bind` impl; a field of any other type is
//! rejected at compile time by the derive.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use super::duration::{format_duration, parse_duration};

/// Value category, used for help output and completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Duration,
    Float,
    Int,
    Int64,
    String,
    Uint,
    Uint64,
    #[default]
    Custom,
}

impl ValueKind {
    /// Type name shown after the flag name in help. Empty for booleans.
    pub fn type_name(self) -> &'static str {
        match self {
            ValueKind::Bool => "",
            ValueKind::Duration => "duration",
            ValueKind::Float => "float",
            ValueKind::Int | ValueKind::Int64 => "int",
            ValueKind::String => "string",
            ValueKind::Uint | ValueKind::Uint64 => "uint",
            ValueKind::Custom => "value",
        }
    }
}

/// How many times a flag may meaningfully occur.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    /// The last occurrence wins.
    #[default]
    Single,
    /// Each occurrence appends.
    List,
    /// Each occurrence adds a `key=value` entry.
    Map,
}

/// Static description of a [`Value`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Shape {
    pub kind: ValueKind,
    pub optional: bool,
    pub multiplicity: Multiplicity,
}

/// A flag value that can be set from a string and rendered back.
///
/// Implement this for custom flag types and bind them with
/// `#[flag(value, "...")]` or [`FlagSet::var`](super::FlagSet::var).
pub trait Value {
    /// Parses `s` and stores the result.
    fn set(&mut self, s: &str) -> Result<()>;

    /// Renders the current value.
    fn get(&self) -> String;

    /// Bool-style flags take no separate value token (`-v`, `-v=false`).
    fn is_bool_flag(&self) -> bool {
        false
    }

    /// Rendering of the type's zero value. A default equal to it is not
    /// shown in help.
    fn zero(&self) -> String {
        String::new()
    }

    fn shape(&self) -> Shape {
        Shape::default()
    }
}

impl<V: Value + ?Sized> Value for &mut V {
    fn set(&mut self, s: &str) -> Result<()> {
        (**self).set(s)
    }
    fn get(&self) -> String {
        (**self).get()
    }
    fn is_bool_flag(&self) -> bool {
        (**self).is_bool_flag()
    }
    fn zero(&self) -> String {
        (**self).zero()
    }
    fn shape(&self) -> Shape {
        (**self).shape()
    }
}

/// Field types that can be bound as a flag.
pub trait Bind {
    fn bind<'a>(&'a mut self) -> Box<dyn Value + 'a>;
}

// ============================================================================
// Scalars
// ============================================================================

/// A scalar type with a textual form.
pub trait Primitive: Default {
    const KIND: ValueKind;

    fn parse(s: &str) -> Result<Self>;

    fn format(&self) -> String;
}

impl Primitive for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn parse(s: &str) -> Result<Self> {
        parse_bool(s)
    }
    fn format(&self) -> String {
        self.to_string()
    }
}

impl Primitive for Duration {
    const KIND: ValueKind = ValueKind::Duration;

    fn parse(s: &str) -> Result<Self> {
        parse_duration(s)
    }
    fn format(&self) -> String {
        format_duration(*self)
    }
}

impl Primitive for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn parse(s: &str) -> Result<Self> {
        s.trim_start_matches('+')
            .replace('_', "")
            .parse()
            .map_err(|_| anyhow!("parse error"))
    }
    fn format(&self) -> String {
        self.to_string()
    }
}

impl Primitive for String {
    const KIND: ValueKind = ValueKind::String;

    fn parse(s: &str) -> Result<Self> {
        Ok(s.to_string())
    }
    fn format(&self) -> String {
        self.clone()
    }
}

impl Primitive for PathBuf {
    const KIND: ValueKind = ValueKind::String;

    fn parse(s: &str) -> Result<Self> {
        Ok(PathBuf::from(s))
    }
    fn format(&self) -> String {
        self.display().to_string()
    }
}

macro_rules! int_primitive {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Primitive for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn parse(s: &str) -> Result<Self> {
                let (negative, magnitude) = parse_int_magnitude(s)?;
                let out = if negative {
                    i128::try_from(magnitude)
                        .ok()
                        .map(|m| -m)
                        .and_then(|v| <$ty>::try_from(v).ok())
                } else {
                    <$ty>::try_from(magnitude).ok()
                };
                out.ok_or_else(|| anyhow!("value out of range"))
            }
            fn format(&self) -> String {
                self.to_string()
            }
        }
    )*};
}

int_primitive! {
    i32 => Int,
    i64 => Int64,
    u32 => Uint,
    u64 => Uint64,
    usize => Uint,
}

/// Accepts `1`, `t`, `T`, `TRUE`, `true`, `True` and their false counterparts.
fn parse_bool(s: &str) -> Result<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => bail!("parse error"),
    }
}

/// Parses an integer literal with an optional sign and base prefix (`0x`,
/// `0o`, `0b`, or a bare leading `0` for octal). Underscores may separate
/// digits when a base prefix is present or the literal is decimal.
fn parse_int_magnitude(s: &str) -> Result<(bool, u128)> {
    let (negative, body) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(d) = lower.strip_prefix("0x") {
        (16, d)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (8, d)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (2, d)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__")
    {
        bail!("parse error");
    }
    let clean = digits.replace('_', "");
    let magnitude = u128::from_str_radix(&clean, radix).map_err(|e| match e.kind() {
        std::num::IntErrorKind::PosOverflow => anyhow!("value out of range"),
        _ => anyhow!("parse error"),
    })?;
    Ok((negative, magnitude))
}

/// Writes through to a scalar field.
pub struct Scalar<'a, T>(pub &'a mut T);

impl<T: Primitive> Value for Scalar<'_, T> {
    fn set(&mut self, s: &str) -> Result<()> {
        *self.0 = T::parse(s)?;
        Ok(())
    }
    fn get(&self) -> String {
        self.0.format()
    }
    fn is_bool_flag(&self) -> bool {
        T::KIND == ValueKind::Bool
    }
    fn zero(&self) -> String {
        T::default().format()
    }
    fn shape(&self) -> Shape {
        Shape {
            kind: T::KIND,
            ..Shape::default()
        }
    }
}

/// Writes through to an `Option` field. Setting the flag stores `Some`, so
/// presence is observable even when the value equals the type's zero.
pub struct Optional<'a, T>(pub &'a mut Option<T>);

impl<T: Primitive> Value for Optional<'_, T> {
    fn set(&mut self, s: &str) -> Result<()> {
        *self.0 = Some(T::parse(s)?);
        Ok(())
    }
    fn get(&self) -> String {
        match self.0.as_ref() {
            Some(v) => v.format(),
            None => T::default().format(),
        }
    }
    fn is_bool_flag(&self) -> bool {
        T::KIND == ValueKind::Bool
    }
    fn zero(&self) -> String {
        T::default().format()
    }
    fn shape(&self) -> Shape {
        Shape {
            kind: T::KIND,
            optional: true,
            ..Shape::default()
        }
    }
}

macro_rules! bind_primitive {
    ($($ty:ty),* $(,)?) => {$(
        impl Bind for $ty {
            fn bind<'a>(&'a mut self) -> Box<dyn Value + 'a> {
                Box::new(Scalar(self))
            }
        }

        impl Bind for Option<$ty> {
            fn bind<'a>(&'a mut self) -> Box<dyn Value + 'a> {
                Box::new(Optional(self))
            }
        }
    )*};
}

bind_primitive!(bool, Duration, f64, i32, i64, String, PathBuf, u32, u64, usize);

// ============================================================================
// Collections
// ============================================================================

/// Appends every occurrence to a `Vec<String>`.
pub struct List<'a>(pub &'a mut Vec<String>);

impl Value for List<'_> {
    fn set(&mut self, s: &str) -> Result<()> {
        self.0.push(s.to_string());
        Ok(())
    }
    fn get(&self) -> String {
        format!("[{}]", self.0.join(" "))
    }
    fn zero(&self) -> String {
        "[]".to_string()
    }
    fn shape(&self) -> Shape {
        Shape {
            kind: ValueKind::String,
            multiplicity: Multiplicity::List,
            ..Shape::default()
        }
    }
}

impl Bind for Vec<String> {
    fn bind<'a>(&'a mut self) -> Box<dyn Value + 'a> {
        Box::new(List(self))
    }
}

/// String-to-string maps that can back a [`Map`] flag.
pub trait StringMap {
    fn insert_pair(&mut self, key: String, value: String);

    /// Entries in key order.
    fn sorted_entries(&self) -> Vec<(&str, &str)>;
}

impl StringMap for BTreeMap<String, String> {
    fn insert_pair(&mut self, key: String, value: String) {
        self.insert(key, value);
    }
    fn sorted_entries(&self) -> Vec<(&str, &str)> {
        self.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }
}

impl<S: BuildHasher> StringMap for HashMap<String, String, S> {
    fn insert_pair(&mut self, key: String, value: String) {
        self.insert(key, value);
    }
    fn sorted_entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        entries.sort_unstable();
        entries
    }
}

/// Adds a `key=value` entry per occurrence. The value is everything after the
/// first `=`, so `-m a=b=c` stores `a` → `b=c`.
pub struct Map<'a, M>(pub &'a mut M);

impl<M: StringMap> Value for Map<'_, M> {
    fn set(&mut self, s: &str) -> Result<()> {
        let Some((key, value)) = s.split_once('=') else {
            bail!("missing '=' in {s:?}");
        };
        self.0.insert_pair(key.to_string(), value.to_string());
        Ok(())
    }
    fn get(&self) -> String {
        let body: Vec<String> = self
            .0
            .sorted_entries()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{{{}}}", body.join(" "))
    }
    fn zero(&self) -> String {
        "{}".to_string()
    }
    fn shape(&self) -> Shape {
        Shape {
            kind: ValueKind::String,
            multiplicity: Multiplicity::Map,
            ..Shape::default()
        }
    }
}

impl Bind for BTreeMap<String, String> {
    fn bind<'a>(&'a mut self) -> Box<dyn Value + 'a> {
        Box::new(Map(self))
    }
}

impl<S: BuildHasher> Bind for HashMap<String, String, S> {
    fn bind<'a>(&'a mut self) -> Box<dyn Value + 'a> {
        Box::new(Map(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_literals() {
        for s in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(parse_bool(s).unwrap(), "{s}");
        }
        for s in ["0", "f", "F", "FALSE", "false", "False"] {
            assert!(!parse_bool(s).unwrap(), "{s}");
        }
        assert!(parse_bool("yes").is_err());
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn test_int_literals() {
        assert_eq!(i32::parse("42").unwrap(), 42);
        assert_eq!(i32::parse("-42").unwrap(), -42);
        assert_eq!(i32::parse("+7").unwrap(), 7);
        assert_eq!(i64::parse("0x1F").unwrap(), 31);
        assert_eq!(i64::parse("0o17").unwrap(), 15);
        assert_eq!(i64::parse("017").unwrap(), 15);
        assert_eq!(u32::parse("0b101").unwrap(), 5);
        assert_eq!(u64::parse("1_000_000").unwrap(), 1_000_000);
        assert_eq!(i32::parse("0").unwrap(), 0);
        assert_eq!(i32::parse("-2147483648").unwrap(), i32::MIN);
    }

    #[test]
    fn test_int_errors() {
        assert_eq!(i32::parse("x").unwrap_err().to_string(), "parse error");
        assert_eq!(i32::parse("").unwrap_err().to_string(), "parse error");
        assert_eq!(i32::parse("1__0").unwrap_err().to_string(), "parse error");
        assert_eq!(i32::parse("0x").unwrap_err().to_string(), "parse error");
        assert_eq!(
            i32::parse("2147483648").unwrap_err().to_string(),
            "value out of range"
        );
        assert_eq!(u32::parse("-1").unwrap_err().to_string(), "value out of range");
    }

    #[test]
    fn test_scalar_writes_through() {
        let mut n = 5i32;
        {
            let mut v = n.bind();
            assert_eq!(v.get(), "5");
            assert_eq!(v.zero(), "0");
            assert!(!v.is_bool_flag());
            v.set("12").unwrap();
        }
        assert_eq!(n, 12);
    }

    #[test]
    fn test_optional_presence() {
        let mut opt: Option<u64> = None;
        {
            let mut v = opt.bind();
            assert_eq!(v.get(), "0");
            assert!(v.shape().optional);
            v.set("0").unwrap();
        }
        assert_eq!(opt, Some(0));

        let mut flag: Option<bool> = None;
        assert!(flag.bind().is_bool_flag());
        flag.bind().set("false").unwrap();
        assert_eq!(flag, Some(false));
    }

    #[test]
    fn test_optional_get_reads_current_value() {
        let mut delay: Option<Duration> = Some(Duration::from_secs(90));
        let mut v = delay.bind();
        assert_eq!(v.get(), "1m30s");
        v.set("2s").unwrap();
        assert_eq!(v.get(), "2s");
        assert_eq!(v.zero(), "0s");
    }

    #[test]
    fn test_list_appends() {
        let mut list = vec!["a".to_string()];
        {
            let mut v = list.bind();
            v.set("b").unwrap();
            assert_eq!(v.get(), "[a b]");
        }
        assert_eq!(list, ["a", "b"]);
    }

    #[test]
    fn test_map_entries() {
        let mut map: HashMap<String, String> = HashMap::new();
        {
            let mut v = map.bind();
            v.set("b=2").unwrap();
            v.set("a=1").unwrap();
            v.set("c=x=y").unwrap();
            assert_eq!(v.get(), "{a=1 b=2 c=x=y}");
            assert_eq!(v.zero(), "{}");
            let err = v.set("oops").unwrap_err();
            assert_eq!(err.to_string(), "missing '=' in \"oops\"");
        }
        assert_eq!(map.len(), 3);
        assert_eq!(map["c"], "x=y");
    }

    #[test]
    fn test_kind_type_names() {
        assert_eq!(ValueKind::Bool.type_name(), "");
        assert_eq!(ValueKind::Int64.type_name(), "int");
        assert_eq!(ValueKind::Uint.type_name(), "uint");
        assert_eq!(ValueKind::Custom.type_name(), "value");
    }
}
