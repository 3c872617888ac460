//! Best-effort numeric coercion shared by every catalog adapter.
//!
//! Catalog payloads carry numbers as strings of varying quality. None of these
//! helpers fail: anything unparseable, negative or non-finite becomes `0`.

/// Parse a non-negative integer the way a lenient web client would: leading
/// whitespace is skipped and parsing stops at the first non-digit, so `"45 min"`
/// yields 45. Negative values and garbage yield 0.
pub fn int(raw: &str) -> u32 {
  let s = raw.trim_start();
  if s.starts_with('-') {
    return 0;
  }
  let s = s.strip_prefix('+').unwrap_or(s);
  let end = s
    .char_indices()
    .find(|(_, c)| !c.is_ascii_digit())
    .map_or(s.len(), |(i, _)| i);
  s[..end].parse().unwrap_or(0)
}

/// Parse a non-negative float; failures, negatives and NaN yield 0.
pub fn float(raw: &str) -> f64 {
  match raw.trim().parse::<f64>() {
    Ok(v) if v.is_finite() && v > 0.0 => v,
    _ => 0.0,
  }
}

/// Parse a comma-separated list of player counts, dropping invalid and
/// non-positive tokens.
pub fn player_list(raw: &str) -> Vec<u32> {
  raw
    .split(',')
    .map(int)
    .filter(|&n| n > 0)
    .collect()
}

/// Expand an inclusive `[min, max]` range into its members. An inverted range
/// is empty.
pub fn expand_range(min: u32, max: u32) -> Vec<u32> { (min..=max).collect() }
