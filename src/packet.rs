//! Per-packet mutable state and the `move` operation that advances it through the flow.

use crate::constants::C;
use crate::estimators::Estimators;

/// Which boundary, if any, a packet most recently crossed.
///
/// Tracked so [`crate::event_loop`] can suppress an immediate re-crossing of the boundary the
/// packet just traversed outward without an intervening scatter (see `EventLoop::d_in`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoundaryCrossing {
    /// The packet just crossed its inner boundary (moving inward).
    Inner,
    /// No boundary crossing since the last interaction.
    None,
    /// The packet just crossed its outer boundary (moving outward).
    Outer,
}

/// The transient, per-packet state threaded through [`crate::event_loop::EventLoop`].
///
/// Allocated on the worker's stack; never heap-allocated or shared across packets.
#[derive(Clone, Debug)]
pub struct Packet {
    /// Rest-frame (lab) frequency, Hz.
    pub nu: f64,
    /// Direction cosine relative to the radial direction, in `[-1, 1]`.
    pub mu: f64,
    /// Rest-frame (lab) energy.
    pub energy: f64,
    /// Current radius, cm.
    pub r: f64,
    /// Current shell index.
    pub shell: usize,
    /// Index of the next unchecked line in `line_list_nu`.
    pub line_cursor: usize,
    /// Set once `line_cursor` has run off the red end of the line list.
    pub last_line: bool,
    /// Set when the packet sits exactly at a line shared with its close neighbor and must
    /// process that neighbor next, at zero distance.
    pub close_line: bool,
    /// Which boundary, if any, was crossed on the most recent geometry step.
    pub recently_crossed_boundary: BoundaryCrossing,
    /// Optical-depth budget remaining until the next scatter/line event.
    pub tau_event: f64,
}

impl Packet {
    /// The Doppler factor `D = 1 - mu * r / (c * t_exp)` relating lab-frame to comoving-frame
    /// frequency and energy, to `O(v/c)`.
    #[must_use]
    pub fn doppler_factor(&self, inverse_time_explosion: f64) -> f64 {
        (self.mu * self.r).mul_add(-inverse_time_explosion / C, 1.0)
    }

    /// The packet's current comoving-frame frequency.
    #[must_use]
    pub fn nu_comov(&self, inverse_time_explosion: f64) -> f64 {
        self.nu * self.doppler_factor(inverse_time_explosion)
    }

    /// Advances the packet by distance `d`, updating its radius and direction cosine and
    /// accumulating the path's contribution into `estimators`. Returns the Doppler factor at the
    /// start of the segment.
    ///
    /// If `d == 0`, the Doppler factor is still computed and returned, but the packet's radius,
    /// direction, and the estimators are left untouched — this is what lets the close-line
    /// zero-distance step in [`crate::event_loop`] reuse this function without disturbing
    /// geometry.
    pub fn advance(&mut self, d: f64, estimators: &mut Estimators, inverse_time_explosion: f64) -> f64 {
        debug_assert!(d >= 0.0, "advance distance must be non-negative, got {d}");

        let doppler = self.doppler_factor(inverse_time_explosion);

        if d == 0.0 {
            return doppler;
        }

        let e_comov = self.energy * doppler;
        let nu_comov = self.nu * doppler;
        estimators.accumulate(self.shell, e_comov, nu_comov, d);

        let r_new = (self.r.mul_add(self.r, d * d) + 2.0 * self.r * d * self.mu).sqrt();
        let mu_new = self.mu.mul_add(self.r, d) / r_new;

        self.r = r_new;
        self.mu = mu_new;

        doppler
    }
}
