//! Human-readable durations such as `1h30m`, `250ms` or `1.5s`.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{bail, Result};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Unit suffixes and their length in nanoseconds. Longer suffixes that share a
/// prefix with shorter ones (`ms` and `m`) come first.
const UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", NANOS_PER_SEC),
    ("m", 60 * NANOS_PER_SEC),
    ("h", 3600 * NANOS_PER_SEC),
];

/// Parses a sequence of decimal numbers, each with an optional fraction and a
/// unit suffix: `300ms`, `1.5h`, `2h45m`. A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let mut s = input;
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        bail!("invalid duration {input:?}");
    }

    let mut total: u128 = 0;
    while !s.is_empty() {
        let int_len = s.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, rest) = s.split_at(int_len);
        s = rest;

        let mut frac_part = "";
        if let Some(rest) = s.strip_prefix('.') {
            let frac_len = rest.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &rest[..frac_len];
            s = &rest[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            bail!("invalid duration {input:?}");
        }

        let unit_len = s
            .char_indices()
            .find(|&(_, c)| c == '.' || c.is_ascii_digit())
            .map_or(s.len(), |(i, _)| i);
        let (unit, rest) = s.split_at(unit_len);
        s = rest;
        if unit.is_empty() {
            bail!("missing unit in duration {input:?}");
        }
        let Some(&(_, scale)) = UNITS.iter().find(|(name, _)| *name == unit) else {
            bail!("unknown unit {unit:?} in duration {input:?}");
        };

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid duration {input:?}"))?
        };
        let mut nanos = whole
            .checked_mul(scale)
            .ok_or_else(|| anyhow::anyhow!("invalid duration {input:?}"))?;
        // Digits beyond nanosecond precision are dropped.
        let mut place = scale;
        for digit in frac_part.bytes() {
            place /= 10;
            if place == 0 {
                break;
            }
            nanos += u128::from(digit - b'0') * place;
        }
        total = total
            .checked_add(nanos)
            .ok_or_else(|| anyhow::anyhow!("invalid duration {input:?}"))?;
    }

    if negative && total != 0 {
        bail!("negative duration {input:?}");
    }
    let nanos = u64::try_from(total).map_err(|_| anyhow::anyhow!("invalid duration {input:?}"))?;
    Ok(Duration::from_nanos(nanos))
}

/// Formats a duration the way [`parse_duration`] reads it, using the largest
/// units that fit: `0s`, `750ms`, `1.5s`, `1m30s`, `2h0m5s`.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < NANOS_PER_SEC {
        let (unit, div) = match nanos {
            n if n < 1_000 => ("ns", 1),
            n if n < 1_000_000 => ("µs", 1_000),
            _ => ("ms", 1_000_000),
        };
        return format!("{}{unit}", decimal(nanos, div));
    }

    let secs = nanos / NANOS_PER_SEC;
    let (hours, minutes) = (secs / 3600, secs / 60 % 60);
    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let sub_minute = nanos % (60 * NANOS_PER_SEC);
    let _ = write!(out, "{}s", decimal(sub_minute, NANOS_PER_SEC));
    out
}

/// Renders `value / div` with the shortest exact decimal fraction.
fn decimal(value: u128, div: u128) -> String {
    let (whole, rem) = (value / div, value % div);
    if rem == 0 {
        return whole.to_string();
    }
    let width = div.ilog10() as usize;
    let frac = format!("{rem:0width$}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
