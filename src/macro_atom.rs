//! The macro-atom transition sampler: given an activated upper level, samples a chain of internal
//! transitions until an emission event, returning the emitted line.

use crate::rng::WorkerRng;
use crate::snapshot::{Snapshot, TransitionType};

/// Samples a macro-atom transition chain starting at `upper_level` in `shell`, returning the
/// emitted line index once an emission transition is reached.
///
/// Termination of the inner search (over transition slots within a level's block) is guaranteed
/// by the snapshot contract that every level's per-shell transition probabilities sum to one
/// (checked once in [`Snapshot::new`]); termination of the outer loop (across levels) is
/// guaranteed by the atomic model itself — every internal chain eventually reaches an emission
/// transition. Neither loop is artificially bounded: an atomic model that violated this would
/// indicate a defect in the input data, not something this function should paper over.
#[must_use]
pub fn emit(snapshot: &Snapshot, upper_level: usize, shell: usize, rng: &mut WorkerRng) -> usize {
    let mut active_level = upper_level;

    loop {
        let u = rng.uniform();
        let mut slot = snapshot.macro_block_start(active_level);
        let mut cumulative = 0.0;

        loop {
            cumulative += snapshot.transition_probability(shell, slot);
            if cumulative > u {
                break;
            }
            slot += 1;
        }

        match snapshot.transition_type(slot) {
            TransitionType::Emission => return snapshot.transition_line_id(slot),
            TransitionType::Up | TransitionType::Down => {
                active_level = snapshot.transition_destination_level(slot);
            }
        }
    }
}
