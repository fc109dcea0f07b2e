//! Per-shell radiation-field moment accumulators.
//!
//! Each [`rayon`] worker owns a private [`Estimators`] buffer while it processes its share of the
//! packet population; [`Estimators::merge`] folds one worker's buffer into another's at the end
//! of a run. Accumulation order within a single packet's traversal is fixed by the packet's event
//! sequence (so a single-threaded rerun of one packet is bit-reproducible); the order in which
//! different workers' buffers are merged is not significant since addition of `f64` contributions
//! from disjoint packets commutes up to the usual floating-point rounding, and the spec only
//! requires additivity across *batches*, not bit-identical sums across thread counts.

/// Non-negative path-length-weighted radiation-field moments, one pair per shell.
#[derive(Clone, Debug)]
pub struct Estimators {
    /// Mean-intensity-like estimator, `J`.
    j: Vec<f64>,
    /// Frequency-weighted estimator, `nu * J` ("nubar").
    nubar: Vec<f64>,
}

impl Estimators {
    /// Creates a zeroed accumulator for `shells` shells.
    #[must_use]
    pub fn zeros(shells: usize) -> Self {
        Self {
            j: vec![0.0; shells],
            nubar: vec![0.0; shells],
        }
    }

    /// Number of shells this accumulator covers.
    #[must_use]
    pub fn shell_count(&self) -> usize {
        self.j.len()
    }

    /// Accumulates the contribution of a path segment of comoving energy `e_comov`, comoving
    /// frequency `nu_comov` and length `distance` into `shell`.
    pub fn accumulate(&mut self, shell: usize, e_comov: f64, nu_comov: f64, distance: f64) {
        let weight = e_comov * distance;
        self.j[shell] += weight;
        self.nubar[shell] += weight * nu_comov;
    }

    /// The accumulated `J` estimator, one entry per shell.
    #[must_use]
    pub fn j(&self) -> &[f64] {
        &self.j
    }

    /// The accumulated `nubar` estimator, one entry per shell.
    #[must_use]
    pub fn nubar(&self) -> &[f64] {
        &self.nubar
    }

    /// Folds `other` into `self`, shell by shell. `other` is left zeroed.
    pub fn merge(&mut self, other: &Self) {
        for (lhs, &rhs) in self.j.iter_mut().zip(&other.j) {
            *lhs += rhs;
        }
        for (lhs, &rhs) in self.nubar.iter_mut().zip(&other.nubar) {
            *lhs += rhs;
        }
    }
}
