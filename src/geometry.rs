//! Distance-to-shell-boundary math in 1D spherical coordinates for a homologous flow.

use crate::constants::MISS_DISTANCE;

/// Distance from `(r, mu)` to the outer boundary of the current shell, at radius `r_outer`.
///
/// The packet is assumed to lie on or inside `r_outer` (`r <= r_outer`), in which case the
/// discriminant below is always non-negative and a real intersection exists travelling along
/// `mu`.
#[must_use]
pub fn distance_to_outer_boundary(r: f64, mu: f64, r_outer: f64) -> f64 {
    let discriminant = r_outer.mul_add(r_outer, (mu * mu - 1.0) * r * r);

    discriminant.sqrt() - r * mu
}

/// Distance from `(r, mu)` to the inner boundary of the current shell, at radius `r_inner`.
///
/// Returns [`MISS_DISTANCE`] if the chord defined by `(r, mu)` does not intersect the inner
/// sphere, or if the packet is moving outward (`mu >= 0`, in which case it can never reach an
/// inner boundary without first passing back through an interaction).
#[must_use]
pub fn distance_to_inner_boundary(r: f64, mu: f64, r_inner: f64) -> f64 {
    if mu >= 0.0 {
        return MISS_DISTANCE;
    }

    let check = r_inner.mul_add(r_inner, (mu * mu - 1.0) * r * r);

    if check < 0.0 {
        return MISS_DISTANCE;
    }

    -r * mu - check.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn outer_boundary_is_non_negative() {
        let r_outer = 3.0;
        for i in 0..=20 {
            let mu = -1.0 + 2.0 * f64::from(i) / 20.0;
            for j in 1..=20 {
                let r = r_outer * f64::from(j) / 20.0;
                let d = distance_to_outer_boundary(r, mu, r_outer);
                assert!(d >= 0.0, "d = {d} for r = {r}, mu = {mu}");
            }
        }
    }

    #[test]
    fn outer_boundary_straight_out_matches_remaining_radius() {
        // mu = 1: moving straight out, distance is exactly r_outer - r
        let r = 1.5;
        let r_outer = 3.0;
        let d = distance_to_outer_boundary(r, 1.0, r_outer);
        assert_approx_eq!(f64, d, r_outer - r, epsilon = 1e-10);
    }

    #[test]
    fn outer_boundary_straight_in_matches_total_chord() {
        // mu = -1 at r = r_outer: distance is the full diameter through center and back out
        let d = distance_to_outer_boundary(3.0, -1.0, 3.0);
        assert_approx_eq!(f64, d, 6.0, epsilon = 1e-10);
    }

    #[test]
    fn inner_boundary_miss_for_outward_motion() {
        for i in 0..=20 {
            let mu = 2.0 * f64::from(i) / 20.0;
            assert_eq!(distance_to_inner_boundary(2.0, mu, 1.0), MISS_DISTANCE);
        }
    }

    #[test]
    fn inner_boundary_miss_for_grazing_chord() {
        // r = r_inner, mu slightly negative but not enough to intersect a smaller sphere placed
        // off to the side: at r == r_inner the chord immediately intersects (check == 0), so we
        // instead probe a chord starting outside that passes wide of the inner sphere.
        let r = 5.0;
        let r_inner = 1.0;
        // mu close to 0 (nearly tangential outward-ish) should miss the small inner sphere
        let mu = -0.05;
        let check = r_inner.mul_add(r_inner, (mu * mu - 1.0) * r * r);
        assert!(check < 0.0, "expected a miss for this configuration");
        assert_eq!(distance_to_inner_boundary(r, mu, r_inner), MISS_DISTANCE);
    }

    #[test]
    fn inner_boundary_hits_when_aimed_at_center() {
        let r = 5.0;
        let r_inner = 1.0;
        let d = distance_to_inner_boundary(r, -1.0, r_inner);
        assert_approx_eq!(f64, d, r - r_inner, epsilon = 1e-10);
    }
}
