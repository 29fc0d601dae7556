//! Flag naming: tag parsing, identifier segmentation and usage placeholders.

use crate::error::ConfigError;

/// Name and usage text of one flag, as declared on a field.
///
/// Built from a tag payload of the form `"name,usage"`. When the payload has
/// no name part the name is derived from the field identifier with
/// [`flag_name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagTag {
    pub name: String,
    pub usage: String,
    pub hidden: bool,
}

impl FlagTag {
    /// Creates a tag with an explicit name and usage.
    pub fn new(name: impl Into<String>, usage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
            hidden: false,
        }
    }

    /// Parses a tag payload for the field `ident`.
    ///
    /// The first comma separates the name from the usage text, unless a space
    /// or a placeholder opener (`{` or `<`) appears before it, in which case
    /// the whole payload is usage text:
    ///
    /// ```
    /// use arbor::FlagTag;
    ///
    /// assert_eq!(FlagTag::parse("verbose", "v,Verbose output").name, "v");
    /// assert_eq!(FlagTag::parse("dry_run", "Only print").name, "dry-run");
    /// assert_eq!(FlagTag::parse("x", "Not a name,").usage, "Not a name,");
    /// assert_eq!(FlagTag::parse("x", ",Flag, with {value}").usage, "Flag, with {value}");
    /// ```
    pub fn parse(ident: &str, payload: &str) -> Self {
        let (name, usage) = split_payload(payload);
        let name = match name {
            Some(n) => n.to_string(),
            None => flag_name(ident.trim_start_matches("r#")),
        };
        Self {
            name,
            usage: usage.to_string(),
            hidden: false,
        }
    }

    /// Marks the flag as hidden from help and completion.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Checks the name against the accepted ASCII flag alphabet.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let valid = !self.name.is_empty()
            && !self.name.starts_with('-')
            && self
                .name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidFlagName(self.name.clone()))
        }
    }
}

/// Splits `"name,usage"` into its parts. The name is `None` when absent.
fn split_payload(payload: &str) -> (Option<&str>, &str) {
    let Some(comma) = payload.find(',') else {
        return (None, payload);
    };
    let head = &payload[..comma];
    if head.contains([' ', '\t', '{', '<']) {
        return (None, payload);
    }
    let usage = &payload[comma + 1..];
    if head.is_empty() {
        (None, usage)
    } else {
        (Some(head), usage)
    }
}

/// Derives a kebab-case flag name from a field identifier.
///
/// Words break at lower→upper transitions, before the last capital of an
/// upper-case run that is followed by a lower-case letter, at letter/digit
/// boundaries and at `_` or `-`. Words are lower-cased and joined with `-`.
///
/// ```
/// use arbor::flag_name;
///
/// assert_eq!(flag_name("ABcd"), "a-bcd");
/// assert_eq!(flag_name("aBCD"), "a-bcd");
/// assert_eq!(flag_name("X_Y"), "x-y");
/// assert_eq!(flag_name("1A"), "1-a");
/// assert_eq!(flag_name("XY"), "xy");
/// assert_eq!(flag_name("dry_run"), "dry-run");
/// ```
pub fn flag_name(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);
    let mut pending_sep = false;

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            pending_sep = !out.is_empty();
            continue;
        }
        if i > 0 && !out.is_empty() && !pending_sep {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let boundary = (prev.is_ascii_lowercase() && c.is_ascii_uppercase())
                || (prev.is_ascii_uppercase()
                    && c.is_ascii_uppercase()
                    && next.is_some_and(|n| n.is_ascii_lowercase()))
                || (prev.is_ascii_digit() != c.is_ascii_digit()
                    && prev.is_ascii_alphanumeric()
                    && c.is_ascii_alphanumeric());
            pending_sep = boundary;
        }
        if pending_sep {
            out.push('-');
            pending_sep = false;
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Extracts the value placeholder from usage text.
///
/// Returns the placeholder name and the usage with the brackets removed. A
/// placeholder is the first `{name}` or `<name>` whose content has no
/// whitespace:
///
/// ```
/// use arbor::flags::unquote_usage;
///
/// assert_eq!(unquote_usage("Read from {file}"), (Some("file"), "Read from file".to_string()));
/// assert_eq!(unquote_usage("Flag {without value}"), (None, "Flag {without value}".to_string()));
/// ```
pub fn unquote_usage(usage: &str) -> (Option<&str>, String) {
    let bytes = usage.as_bytes();
    let mut open: Option<(usize, u8)> = None;
    for (j, &b) in bytes.iter().enumerate() {
        match b {
            b'{' | b'<' if open.is_none() => open = Some((j, b)),
            b'}' | b'>' => {
                if let Some((i, opener)) = open {
                    let matches = (opener == b'{' && b == b'}') || (opener == b'<' && b == b'>');
                    if matches && j > i + 1 {
                        let name = &usage[i + 1..j];
                        let plain = format!("{}{}{}", &usage[..i], name, &usage[j + 1..]);
                        return (Some(name), plain);
                    }
                    open = None;
                }
            }
            b' ' | b'\t' => open = None,
            _ => {}
        }
    }
    (None, usage.to_string())
}
