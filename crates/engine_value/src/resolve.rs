//! The conflict-resolution rule.
//!
//! A last-writer-wins register with a deterministic tie-break, not a vector
//! clock: clocks are locally monotonic per writer and the registry always
//! proposes `last observed + 1`, so identity comparison at equal clocks is
//! enough to make resolution order-independent under network reordering.

use crate::source::WriterSource;

/// Outcome of applying a proposed write to a clocked cell.
///
/// Only [`Acceptance::Accepted`] changes state. The other outcomes are
/// silent drops, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// The write was newer (or won the tie-break) and was stored.
    Accepted,
    /// The proposed clock was behind the cell's clock.
    Stale,
    /// Same clock, but the proposing writer does not outrank the holder.
    Outranked,
}

impl Acceptance {
    /// Returns `true` if the write was stored.
    #[must_use]
    pub fn is_accepted(self) -> bool {
        matches!(self, Acceptance::Accepted)
    }
}

/// Decide whether a proposed write replaces the current cell state.
///
/// Applied writes are `(value, proposed_clock, writer)` triples; this
/// function looks only at the clock pair and the writer identities:
///
/// 1. `proposed < current` → [`Acceptance::Stale`].
/// 2. `proposed == current` → accepted only if `proposed_source` outranks
///    `current_source`, else [`Acceptance::Outranked`].
/// 3. `proposed > current` → accepted unconditionally.
#[must_use]
pub fn resolve(
    current_clock: u32,
    current_source: &WriterSource,
    proposed_clock: u32,
    proposed_source: &WriterSource,
) -> Acceptance {
    if proposed_clock < current_clock {
        Acceptance::Stale
    } else if proposed_clock == current_clock {
        if proposed_source.outranks(current_source) {
            Acceptance::Accepted
        } else {
            Acceptance::Outranked
        }
    } else {
        Acceptance::Accepted
    }
}
