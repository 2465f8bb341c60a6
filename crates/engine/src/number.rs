//! Number-to-speech composition
//!
//! Decomposes an integer into the ordered audio segments that pronounce it
//! in Arabic: rounded thousands and hundreds magnitudes, 1-19 as direct
//! recordings, 20-99 with the units spoken before the tens, and the "wa"
//! (and) connector between every two spoken parts. Segment ids are the
//! file names under the language's `numbers/` sound directory.

use tracing::warn;

const CONNECTOR: &str = "wa";

/// Decompose a non-negative integer into ordered segment ids.
///
/// Negative input decomposes to nothing; callers skip playback entirely
/// rather than failing the call over a bad variable.
pub fn decompose(number: i64) -> Vec<String> {
    if number < 0 {
        warn!(number, "cannot speak negative number, skipping");
        return Vec::new();
    }
    if number == 0 {
        return vec!["0".to_string()];
    }

    let mut parts: Vec<String> = Vec::new();
    let mut remaining = number;

    if remaining >= 1000 {
        parts.push(((remaining / 1000) * 1000).to_string());
        remaining %= 1000;
    }
    if remaining >= 100 {
        parts.push(((remaining / 100) * 100).to_string());
        remaining %= 100;
    }
    if remaining > 0 {
        if remaining <= 19 {
            parts.push(remaining.to_string());
        } else {
            // units are pronounced before tens ("three and fifty" = 53)
            let tens = (remaining / 10) * 10;
            let units = remaining % 10;
            if units > 0 {
                parts.push(units.to_string());
            }
            parts.push(tens.to_string());
        }
    }

    let mut segments = Vec::with_capacity(parts.len() * 2);
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            segments.push(CONNECTOR.to_string());
        }
        segments.push(part);
    }
    segments
}

/// Decompose a rendered variable value. Decimal strings speak the integer
/// part (currency amounts); anything non-numeric decomposes to nothing.
pub fn decompose_text(text: &str) -> Vec<String> {
    let whole = text.split('.').next().unwrap_or(text).trim();
    match whole.parse::<i64>() {
        Ok(n) => decompose(n),
        Err(_) => {
            warn!(value = text, "not a number, skipping spoken playback");
            Vec::new()
        }
    }
}
