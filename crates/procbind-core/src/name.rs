//! Pure helpers over procedure names.
//!
//! Names form *variant families*: stripping a trailing run of ASCII digits from
//! a name yields its canonical base (`"DFS2"` -> `"DFS"`). Placeholder names
//! (the editor's defaults for a block nobody has named yet) belong to no
//! family and are never matched against anything.

/// Names the editor uses for blocks that have not been named yet.
const PLACEHOLDER_NAMES: [&str; 2] = ["unnamed", "undefined"];

/// Returns `true` if `name` is empty, whitespace-only, or an editor
/// placeholder such as `"unnamed"`.
pub fn is_placeholder(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || PLACEHOLDER_NAMES.contains(&trimmed)
}

/// Returns `true` for names that can participate in matching.
pub fn is_valid(name: &str) -> bool {
    !is_placeholder(name)
}

/// Strips a trailing digit run from `name`.
///
/// Returns `None` for placeholder names. A name made entirely of digits is
/// its own base, since stripping would leave nothing to match on.
pub fn canonical_base(name: &str) -> Option<&str> {
    if is_placeholder(name) {
        return None;
    }
    let stripped = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if stripped.is_empty() {
        Some(name)
    } else {
        Some(stripped)
    }
}

/// Returns `true` if `name` carries a numeric variant suffix (`"DFS2"`).
pub fn is_numbered_variant(name: &str) -> bool {
    canonical_base(name).is_some_and(|base| base.len() != name.len())
}

/// Returns `true` if both names are valid and share a canonical base.
pub fn same_family(a: &str, b: &str) -> bool {
    match (canonical_base(a), canonical_base(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
