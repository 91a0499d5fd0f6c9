//! Wildcard key matching for pattern invalidation
//!
//! Patterns use `*` as a multi-character wildcard; any number of
//! wildcards may appear at any position. No other metacharacters are
//! recognized.

/// Check if a key matches a wildcard pattern
pub fn matches_pattern(key: &str, pattern: &str) -> bool {
    if !pattern.contains('*') {
        return key == pattern;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let last_index = segments.len() - 1;

    // First segment anchors at the start of the key
    if !key.starts_with(segments[0]) {
        return false;
    }
    let mut pos = segments[0].len();

    // Middle segments must appear in order
    for segment in &segments[1..last_index] {
        if segment.is_empty() {
            continue;
        }
        match key[pos..].find(segment) {
            Some(found) => pos += found + segment.len(),
            None => return false,
        }
    }

    // Last segment anchors at the end, at or after the current position
    let last = segments[last_index];
    if last.is_empty() {
        return true;
    }
    key.len() >= pos + last.len() && key.ends_with(last)
}
