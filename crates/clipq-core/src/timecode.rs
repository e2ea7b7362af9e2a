//! `HH:MM:SS` timecodes for trim windows and stream durations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A whole-second position or length, written as `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timecode(u32);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' does not match the format 'HH:MM:SS'")]
pub struct TimecodeError(pub String);

impl Timecode {
    pub const ZERO: Timecode = Timecode(0);

    pub fn from_secs(secs: u32) -> Self {
        Timecode(secs)
    }

    /// Whole seconds from a fractional duration (as reported by extractors).
    /// Negative and non-finite values clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Timecode::ZERO;
        }
        Timecode(secs.floor().min(u32::MAX as f64) as u32)
    }

    pub fn as_secs(self) -> u32 {
        self.0
    }

    /// Parses `H:M:S`. Hours take one or more digits (so anything `Display`
    /// prints parses back); minutes and seconds take one or two, below 60.
    pub fn parse(s: &str) -> Result<Self, TimecodeError> {
        let err = || TimecodeError(s.to_string());
        let mut fields = s.trim().split(':');
        let (Some(h), Some(m), Some(sec), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(err());
        };
        let h = parse_field(h, usize::MAX, u32::MAX).ok_or_else(err)?;
        let m = parse_field(m, 2, 59).ok_or_else(err)?;
        let sec = parse_field(sec, 2, 59).ok_or_else(err)?;
        h.checked_mul(3600)
            .and_then(|t| t.checked_add(m * 60 + sec))
            .map(Timecode)
            .ok_or_else(err)
    }
}

fn parse_field(field: &str, max_len: usize, max: u32) -> Option<u32> {
    if field.is_empty() || field.len() > max_len || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u32 = field.parse().ok()?;
    (value <= max).then_some(value)
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.0 / 3600;
        let m = (self.0 % 3600) / 60;
        let s = self.0 % 60;
        write!(f, "{:02}:{:02}:{:02}", h, m, s)
    }
}

impl FromStr for Timecode {
    type Err = TimecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timecode::parse(s)
    }
}

impl TryFrom<String> for Timecode {
    type Error = TimecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Timecode::parse(&value)
    }
}

impl From<Timecode> for String {
    fn from(value: Timecode) -> Self {
        value.to_string()
    }
}
