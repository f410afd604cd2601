//! Nanosecond timecodes as used by chapters and the command line.

use thiserror::Error;

/// Command line timecode that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimecodeError {
    #[error("invalid timecode '{0}', expected [[HH:]MM:]SS[.fff]")]
    Invalid(String),

    #[error("timecode '{0}' out of range")]
    OutOfRange(String),
}

/// Format a nanosecond timecode as `HH:MM:SS.mmm`.
pub fn format_timecode(ns: u64) -> String {
    let ms = ns / 1_000_000;
    let secs = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        ms % 1000
    )
}

/// Parse `[[HH:]MM:]SS[.fff]` into nanoseconds.
pub fn parse_timecode(text: &str) -> Result<u64, TimecodeError> {
    let invalid = || TimecodeError::Invalid(text.to_string());
    let out_of_range = || TimecodeError::OutOfRange(text.to_string());

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };

    let parts: Vec<&str> = whole.split(':').collect();
    if parts.len() > 3 {
        return Err(invalid());
    }
    let mut secs: u64 = 0;
    for (i, part) in parts.iter().enumerate() {
        let value: u64 = part.parse().map_err(|_| invalid())?;
        if i > 0 && value > 59 {
            return Err(invalid());
        }
        secs = secs
            .checked_mul(60)
            .and_then(|s| s.checked_add(value))
            .ok_or_else(out_of_range)?;
    }

    let mut ns = secs.checked_mul(1_000_000_000).ok_or_else(out_of_range)?;
    if let Some(fraction) = fraction {
        if fraction.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let padded = format!("{:0<9}", fraction);
        let sub: u64 = padded.parse().map_err(|_| invalid())?;
        ns = ns.checked_add(sub).ok_or_else(out_of_range)?;
    }
    Ok(ns)
}

/// Like [`parse_timecode`] with an optional leading sign.
pub fn parse_signed_timecode(text: &str) -> Result<i64, TimecodeError> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let ns = i64::try_from(parse_timecode(rest)?)
        .map_err(|_| TimecodeError::OutOfRange(text.to_string()))?;
    Ok(if negative { -ns } else { ns })
}
