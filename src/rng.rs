//! Independent, seeded pseudo-random number streams, one per packet.
//!
//! There is no process-wide mutable RNG. [`crate::transport::run`] derives each packet's stream
//! from the run seed and the packet's index (see `DESIGN.md`), so a transport run's result is
//! reproducible given a seed and is independent of worker thread count, not merely of scheduling
//! order within a fixed one.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A single independent uniform-draw stream.
///
/// Wraps [`Pcg64Mcg`] (small state, fast, seedable) rather than the Mersenne-Twister-class
/// generator the historical reference used — see `DESIGN.md` for why bit-compatibility with that
/// stream is not a goal here.
pub struct WorkerRng(Pcg64Mcg);

impl WorkerRng {
    /// Seeds a stream deterministically from a run-level `seed` and a `stream_index` (in practice,
    /// a packet index — see `DESIGN.md`).
    ///
    /// Mixing the index into the seed (rather than just adding it) keeps nearby indices from
    /// producing correlated early draws under a generator with weak low-order seed sensitivity.
    #[must_use]
    pub fn new(seed: u64, stream_index: u64) -> Self {
        let mixed = seed ^ stream_index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self(Pcg64Mcg::seed_from_u64(mixed))
    }

    /// Draws `U ~ Uniform(0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.0.gen_range(0.0..1.0)
    }

    /// Draws a fresh optical-depth budget `-ln(U)`, `U ~ Uniform(0, 1)`.
    pub fn draw_tau_event(&mut self) -> f64 {
        -self.uniform().ln()
    }

    /// Draws an isotropic direction cosine `2U - 1`, `U ~ Uniform(0, 1)`.
    pub fn draw_isotropic_mu(&mut self) -> f64 {
        2.0f64.mul_add(self.uniform(), -1.0)
    }
}
