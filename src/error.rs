//! Error types for snapshot validation and strict-mode transport failures.

use thiserror::Error;

/// Errors that can occur while building a [`crate::snapshot::Snapshot`] or running transport.
#[derive(Debug, Error)]
pub enum Error {
    /// `line_list_nu` is not strictly decreasing, so [`crate::line_search`] can't binary search it.
    #[error("line_list_nu is not strictly decreasing at index {index}: {prev} <= {next}")]
    LineListNotMonotonic {
        /// Index of the first offending pair (`line_list_nu[index]` vs. `line_list_nu[index + 1]`).
        index: usize,
        /// `line_list_nu[index]`.
        prev: f64,
        /// `line_list_nu[index + 1]`.
        next: f64,
    },
    /// A shell's electron density was not strictly positive.
    #[error("electron_density[{shell}] = {value} is not strictly positive")]
    NonPositiveElectronDensity {
        /// Offending shell index.
        shell: usize,
        /// The offending value.
        value: f64,
    },
    /// A `tau_sobolev` entry was negative.
    #[error("tau_sobolev[shell = {shell}, line = {line}] = {value} is negative")]
    NegativeTauSobolev {
        /// Offending shell index.
        shell: usize,
        /// Offending line index.
        line: usize,
        /// The offending value.
        value: f64,
    },
    /// Shell boundaries were not contiguous and strictly increasing.
    #[error("shell {shell}: r_outer ({outer}) does not match r_inner of the next shell ({next_inner})")]
    DiscontinuousShells {
        /// Offending shell index.
        shell: usize,
        /// `r_outer[shell]`.
        outer: f64,
        /// `r_inner[shell + 1]`.
        next_inner: f64,
    },
    /// Within a macro-atom level's transition block, the per-shell probabilities did not sum to
    /// one within tolerance.
    #[error(
        "macro-atom level {level}, shell {shell}: transition probabilities sum to {sum}, expected 1.0"
    )]
    MacroAtomProbabilitiesNotNormalized {
        /// Offending macro-atom level.
        level: usize,
        /// Offending shell index.
        shell: usize,
        /// The observed sum.
        sum: f64,
    },
    /// `macro_block_refs` was not non-decreasing, or its last entry didn't match the transition
    /// table length.
    #[error("macro_block_refs is malformed: {0}")]
    MalformedMacroBlockRefs(String),
    /// A numeric anomaly (NaN, negative distance, a comoving frequency redward of the line it was
    /// checked against) was detected while transporting a packet. Only returned when
    /// [`crate::transport::TransportConfig::strict`] is set; otherwise the anomaly is logged and
    /// transport continues.
    #[error("numeric anomaly during transport of packet {packet}: {detail}")]
    NumericAnomaly {
        /// Index of the packet that triggered the anomaly.
        packet: usize,
        /// Human-readable description of what went wrong.
        detail: String,
    },
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
