//! Dotted numeric version ordering.
//!
//! Versions are compared component-wise as non-negative integers, left to
//! right. Missing trailing components count as `0`, so `"1.2"` and `"1.2.0"`
//! are equal. Components that fail to parse also count as `0`, except
//! all-digit components too large for `u64`, which saturate to `u64::MAX`.
//! Comparison never fails.

use std::cmp::Ordering;

/// Parse a version string into its numeric components.
fn components(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map(|part| component(part.trim()))
        .collect()
}

fn component(part: &str) -> u64 {
    match part.parse::<u64>() {
        Ok(n) => n,
        Err(_) if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) => u64::MAX,
        Err(_) => 0,
    }
}

/// Compare two version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    let left = components(a);
    let right = components(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    Ordering::Equal
}

/// Compare two versions as `-1`, `0` or `1`.
pub fn compare_i8(a: &str, b: &str) -> i8 {
    match compare(a, b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Returns `true` when `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare(candidate, current) == Ordering::Greater
}

/// Pick the highest version out of an iterator of version strings.
pub fn max_version<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .fold(None, |best: Option<&str>, v| match best {
            Some(b) if compare(v, b) != Ordering::Greater => Some(b),
            _ => Some(v),
        })
}
