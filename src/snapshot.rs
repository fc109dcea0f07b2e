//! The immutable plasma/atomic snapshot consumed by transport.
//!
//! `Snapshot` is a flat structure-of-arrays, the same layout the reference implementation uses,
//! kept that way deliberately: the per-packet hot loop indexes into `tau_sobolev` and
//! `transition_probabilities` millions of times per run, and an object graph would defeat cache
//! locality for no benefit (the macro atom has no real "inheritance", it's a table).

use crate::error::{Error, Result};
use float_cmp::approx_eq;
use ndarray::Array2;

/// Line-interaction mode selecting how an absorbed line re-emits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineInteraction {
    /// Resonance scattering: the absorbing line re-emits on itself.
    Scatter,
    /// Macro-atom emission restricted so the first jump out of the activated level is always an
    /// emission (no internal upward transitions).
    Downbranch,
    /// Full macro-atom emission: internal transitions may go up or down before emitting.
    Macro,
}

impl LineInteraction {
    /// Whether [`crate::macro_atom`] must be consulted at all, or whether the emitted line is
    /// simply the line that was absorbed.
    #[must_use]
    pub const fn uses_macro_atom(self) -> bool {
        !matches!(self, Self::Scatter)
    }
}

/// Per-transition-slot role in the macro-atom network.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransitionType {
    /// Internal transition to a higher level.
    Up,
    /// Internal transition to a lower level (without emitting a photon).
    Down,
    /// Terminates the chain by emitting a photon on `transition_line_id`.
    Emission,
}

/// The read-only plasma/atomic state shared by every packet in a run.
///
/// Construct with [`Snapshot::new`], which validates every contract listed in the module-level
/// docs before handing back a usable snapshot; a malformed snapshot is refused up front rather
/// than corrupting a run partway through.
#[derive(Debug)]
pub struct Snapshot {
    r_inner: Vec<f64>,
    r_outer: Vec<f64>,
    v_inner: Vec<f64>,
    electron_density: Vec<f64>,
    inverse_electron_density: Vec<f64>,
    line_list_nu: Vec<f64>,
    tau_sobolev: Array2<f64>,
    line_interaction: LineInteraction,
    line2macro_upper: Vec<usize>,
    macro_block_refs: Vec<usize>,
    transition_probabilities: Array2<f64>,
    transition_type: Vec<TransitionType>,
    transition_destination_level: Vec<usize>,
    transition_line_id: Vec<usize>,
    time_explosion: f64,
    inverse_time_explosion: f64,
}

/// Raw, unvalidated inputs handed to [`Snapshot::new`].
///
/// This mirrors the table in §3 of the spec field-for-field; grouping them in a single struct
/// keeps `Snapshot::new`'s signature from growing an unmanageable number of positional arguments.
pub struct SnapshotInputs {
    /// Inner shell boundary radii, cm.
    pub r_inner: Vec<f64>,
    /// Outer shell boundary radii, cm.
    pub r_outer: Vec<f64>,
    /// Inner-boundary velocities, cm/s (diagnostic only, unused by transport).
    pub v_inner: Vec<f64>,
    /// Per-shell electron number density, cm⁻³.
    pub electron_density: Vec<f64>,
    /// Rest-frame line frequencies, Hz, strictly decreasing.
    pub line_list_nu: Vec<f64>,
    /// Sobolev optical depths, shape `(shells, lines)`, row-major by shell.
    pub tau_sobolev: Array2<f64>,
    /// Selects how absorbed lines re-emit.
    pub line_interaction: LineInteraction,
    /// For each line, the macro-atom upper level activated on absorption.
    pub line2macro_upper: Vec<usize>,
    /// Starting offset into the transition arrays for each macro-atom level.
    pub macro_block_refs: Vec<usize>,
    /// Per-shell, per-transition probability contributions, shape `(shells, transitions)`.
    pub transition_probabilities: Array2<f64>,
    /// Role of each transition slot.
    pub transition_type: Vec<TransitionType>,
    /// Target level for `Up`/`Down` transitions (ignored for `Emission` slots).
    pub transition_destination_level: Vec<usize>,
    /// Emitted line for `Emission` transitions (ignored for `Up`/`Down` slots).
    pub transition_line_id: Vec<usize>,
    /// Elapsed time since explosion, s.
    pub time_explosion: f64,
}

const PROBABILITY_SUM_TOLERANCE_ULPS: i64 = 1 << 20;

impl Snapshot {
    /// Validates `inputs` against the contracts listed in the error handling design and builds a
    /// [`Snapshot`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] variant describing the first contract violation found: a
    /// non-monotonic line list, a non-positive electron density, a negative Sobolev optical
    /// depth, discontinuous shell boundaries, or macro-atom transition probabilities that don't
    /// sum to one per shell within tolerance.
    pub fn new(inputs: SnapshotInputs) -> Result<Self> {
        let shells = inputs.r_inner.len();
        let lines = inputs.line_list_nu.len();

        for (i, window) in inputs.line_list_nu.windows(2).enumerate() {
            if window[0] <= window[1] {
                return Err(Error::LineListNotMonotonic {
                    index: i,
                    prev: window[0],
                    next: window[1],
                });
            }
        }

        for (shell, &value) in inputs.electron_density.iter().enumerate() {
            if value <= 0.0 {
                return Err(Error::NonPositiveElectronDensity { shell, value });
            }
        }

        for shell in 0..shells.saturating_sub(1) {
            let outer = inputs.r_outer[shell];
            let next_inner = inputs.r_inner[shell + 1];
            if !approx_eq!(f64, outer, next_inner, ulps = 8) {
                return Err(Error::DiscontinuousShells {
                    shell,
                    outer,
                    next_inner,
                });
            }
        }

        for ((shell, line), &value) in inputs.tau_sobolev.indexed_iter() {
            if value < 0.0 {
                return Err(Error::NegativeTauSobolev { shell, line, value });
            }
        }
        let _ = lines;

        if inputs.macro_block_refs.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::MalformedMacroBlockRefs(
                "macro_block_refs must be non-decreasing".to_string(),
            ));
        }

        if let Some(&total) = inputs.macro_block_refs.last() {
            if total != inputs.transition_type.len() {
                return Err(Error::MalformedMacroBlockRefs(format!(
                    "last macro_block_refs entry ({total}) does not match the transition table length ({})",
                    inputs.transition_type.len()
                )));
            }
        }

        if inputs.line_interaction.uses_macro_atom() {
            for shell in 0..shells {
                for level in 0..inputs.macro_block_refs.len().saturating_sub(1) {
                    let start = inputs.macro_block_refs[level];
                    let end = inputs.macro_block_refs[level + 1];
                    if start == end {
                        continue;
                    }
                    let sum: f64 = (start..end)
                        .map(|slot| inputs.transition_probabilities[[shell, slot]])
                        .sum();
                    if !approx_eq!(f64, sum, 1.0, ulps = PROBABILITY_SUM_TOLERANCE_ULPS) {
                        return Err(Error::MacroAtomProbabilitiesNotNormalized {
                            level,
                            shell,
                            sum,
                        });
                    }
                }
            }
        }

        let inverse_electron_density = inputs.electron_density.iter().map(|d| 1.0 / d).collect();

        Ok(Self {
            r_inner: inputs.r_inner,
            r_outer: inputs.r_outer,
            v_inner: inputs.v_inner,
            electron_density: inputs.electron_density,
            inverse_electron_density,
            line_list_nu: inputs.line_list_nu,
            tau_sobolev: inputs.tau_sobolev,
            line_interaction: inputs.line_interaction,
            line2macro_upper: inputs.line2macro_upper,
            macro_block_refs: inputs.macro_block_refs,
            transition_probabilities: inputs.transition_probabilities,
            transition_type: inputs.transition_type,
            transition_destination_level: inputs.transition_destination_level,
            transition_line_id: inputs.transition_line_id,
            time_explosion: inputs.time_explosion,
            inverse_time_explosion: 1.0 / inputs.time_explosion,
        })
    }

    /// Number of shells.
    #[must_use]
    pub fn shell_count(&self) -> usize {
        self.r_inner.len()
    }

    /// Number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_list_nu.len()
    }

    /// Inner radius of `shell`, cm.
    #[must_use]
    pub fn r_inner(&self, shell: usize) -> f64 {
        self.r_inner[shell]
    }

    /// Outer radius of `shell`, cm.
    #[must_use]
    pub fn r_outer(&self, shell: usize) -> f64 {
        self.r_outer[shell]
    }

    /// Inner-boundary velocity of `shell`, cm/s. Diagnostic only.
    #[must_use]
    pub fn v_inner(&self, shell: usize) -> f64 {
        self.v_inner[shell]
    }

    /// Electron number density of `shell`, cm⁻³.
    #[must_use]
    pub fn electron_density(&self, shell: usize) -> f64 {
        self.electron_density[shell]
    }

    /// Reciprocal electron number density of `shell`, precomputed.
    #[must_use]
    pub fn inverse_electron_density(&self, shell: usize) -> f64 {
        self.inverse_electron_density[shell]
    }

    /// The full, strictly decreasing line frequency table.
    #[must_use]
    pub fn line_list_nu(&self) -> &[f64] {
        &self.line_list_nu
    }

    /// Rest-frame frequency of `line`, Hz.
    #[must_use]
    pub fn line_nu(&self, line: usize) -> f64 {
        self.line_list_nu[line]
    }

    /// Sobolev optical depth of `line` in `shell`.
    #[must_use]
    pub fn tau_sobolev(&self, shell: usize, line: usize) -> f64 {
        self.tau_sobolev[[shell, line]]
    }

    /// The configured line-interaction mode.
    #[must_use]
    pub const fn line_interaction(&self) -> LineInteraction {
        self.line_interaction
    }

    /// Macro-atom upper level activated when `line` is absorbed.
    #[must_use]
    pub fn macro_upper_level(&self, line: usize) -> usize {
        self.line2macro_upper[line]
    }

    /// Starting offset into the transition arrays for macro-atom `level`.
    #[must_use]
    pub fn macro_block_start(&self, level: usize) -> usize {
        self.macro_block_refs[level]
    }

    /// Transition probability contribution of `slot` in `shell`.
    #[must_use]
    pub fn transition_probability(&self, shell: usize, slot: usize) -> f64 {
        self.transition_probabilities[[shell, slot]]
    }

    /// Role of transition `slot`.
    #[must_use]
    pub fn transition_type(&self, slot: usize) -> TransitionType {
        self.transition_type[slot]
    }

    /// Destination level of transition `slot` (meaningful for `Up`/`Down` slots only).
    #[must_use]
    pub fn transition_destination_level(&self, slot: usize) -> usize {
        self.transition_destination_level[slot]
    }

    /// Emitted line of transition `slot` (meaningful for `Emission` slots only).
    #[must_use]
    pub fn transition_line_id(&self, slot: usize) -> usize {
        self.transition_line_id[slot]
    }

    /// Elapsed time since explosion, s.
    #[must_use]
    pub const fn time_explosion(&self) -> f64 {
        self.time_explosion
    }

    /// Reciprocal elapsed time since explosion, precomputed.
    #[must_use]
    pub const fn inverse_time_explosion(&self) -> f64 {
        self.inverse_time_explosion
    }
}
