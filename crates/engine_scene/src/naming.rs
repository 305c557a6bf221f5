//! Sibling name deduplication.
//!
//! No two children of one parent may share a name at any observable instant.
//! When an incoming child collides, it is renamed rather than rejected: the
//! name is parsed as `base` plus an optional trailing `.N`, suffixes
//! `base.1 ..= base.999` are tried linearly, and past 999 the first free
//! integer slot is found by doubling the upper bound and binary-searching.

/// Split a trailing `.N` numeric suffix off a name.
///
/// `"crate.7"` → `("crate", Some(7))`; `"crate"` → `("crate", None)`;
/// `"v1.x"` has no numeric suffix and is returned whole.
#[must_use]
pub fn split_suffix(name: &str) -> (&str, Option<u32>) {
    if let Some((base, suffix)) = name.rsplit_once('.')
        && !base.is_empty()
        && let Ok(n) = suffix.parse::<u32>()
    {
        return (base, Some(n));
    }
    (name, None)
}

/// Linear probe ceiling before switching to the binary-search fallback.
const LINEAR_LIMIT: u32 = 999;

/// Pick a name for an incoming sibling, renaming on collision.
///
/// `taken` reports whether a candidate name is already used by a sibling.
/// Returns `desired` unchanged when it is free.
pub fn deduplicate_name(desired: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(desired) {
        return desired.to_string();
    }

    let (base, _) = split_suffix(desired);

    for n in 1..=LINEAR_LIMIT {
        let candidate = format!("{base}.{n}");
        if !taken(&candidate) {
            return candidate;
        }
    }

    // Dense past 999: find an upper bound by doubling, then binary-search the
    // first free slot. Occupancy is contiguous under single-threaded
    // mutation, so the predicate is monotone over the searched range.
    let mut lo = LINEAR_LIMIT; // known taken (or below linear range)
    let mut hi = LINEAR_LIMIT * 2;
    while taken(&format!("{base}.{hi}")) {
        lo = hi;
        hi *= 2;
    }
    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        if taken(&format!("{base}.{mid}")) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    format!("{base}.{hi}")
}
