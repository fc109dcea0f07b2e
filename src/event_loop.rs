//! The per-packet event-selection state machine.
//!
//! At every step four candidate distances are computed — to the outer boundary, to the inner
//! boundary, to the next electron scatter, and to the next line — and the smallest wins. This is
//! the hottest part of the kernel (a single packet can cross millions of lines), so the loop body
//! avoids allocation entirely; everything it touches is either on the stack or a borrow into the
//! read-only [`Snapshot`].

use crate::constants::{MISS_DISTANCE, SIGMA_THOMSON};
use crate::error::{Error, Result};
use crate::estimators::Estimators;
use crate::geometry::{distance_to_inner_boundary, distance_to_outer_boundary};
use crate::line_search::next_line_index;
use crate::macro_atom;
use crate::packet::{BoundaryCrossing, Packet};
use crate::rng::WorkerRng;
use crate::snapshot::{LineInteraction, Snapshot};

/// How a packet's transport terminated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The packet escaped through the outer boundary of the outermost shell.
    Escaped,
    /// The packet was reabsorbed by the photosphere at the inner boundary of the innermost shell.
    Reabsorbed,
}

/// The final state of a packet that has finished transport.
#[derive(Clone, Copy, Debug)]
pub struct PacketResult {
    /// How transport terminated.
    pub outcome: Outcome,
    /// Final lab-frame frequency, Hz.
    pub nu: f64,
    /// Final lab-frame energy.
    pub energy: f64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Event {
    Outer,
    Inner,
    Electron,
    Line,
}

/// Sets up a packet's initial state at the base of the ejecta and runs it to completion.
///
/// `packet_index` is only used to label numeric-anomaly diagnostics and errors; it carries no
/// semantic weight for the physics.
///
/// # Errors
///
/// Returns [`Error::NumericAnomaly`] if `strict` is set and a numeric anomaly (a negative
/// distance, a NaN, or a comoving frequency redward of the line it was checked against) is
/// detected. In non-strict mode the same conditions are logged via [`tracing::warn`] and the
/// packet continues.
pub fn transport_packet(
    snapshot: &Snapshot,
    nu: f64,
    mu: f64,
    energy: f64,
    packet_index: usize,
    estimators: &mut Estimators,
    rng: &mut WorkerRng,
    strict: bool,
) -> Result<PacketResult> {
    let inv_t_exp = snapshot.inverse_time_explosion();

    let mut packet = Packet {
        nu,
        mu,
        energy,
        r: snapshot.r_inner(0),
        shell: 0,
        line_cursor: 0,
        last_line: false,
        close_line: false,
        recently_crossed_boundary: BoundaryCrossing::None,
        tau_event: rng.draw_tau_event(),
    };

    let nu_comov = packet.nu_comov(inv_t_exp);
    packet.line_cursor = next_line_index(snapshot.line_list_nu(), nu_comov);
    packet.last_line = packet.line_cursor >= snapshot.line_count();

    loop {
        let d_out = distance_to_outer_boundary(packet.r, packet.mu, snapshot.r_outer(packet.shell));

        let d_in = if packet.recently_crossed_boundary == BoundaryCrossing::Outer {
            MISS_DISTANCE
        } else {
            distance_to_inner_boundary(packet.r, packet.mu, snapshot.r_inner(packet.shell))
        };

        if d_out.is_nan() || d_out < 0.0 {
            report_anomaly(packet_index, strict, format!("bad outer-boundary distance {d_out}"))?;
        }

        let d_e = packet.tau_event * snapshot.inverse_electron_density(packet.shell) / SIGMA_THOMSON;

        if d_e.is_nan() || d_e < 0.0 {
            report_anomaly(packet_index, strict, format!("bad electron-scatter distance {d_e}"))?;
        }

        let was_close_line = packet.close_line;
        packet.close_line = false;

        let d_line = if was_close_line {
            0.0
        } else if packet.last_line {
            MISS_DISTANCE
        } else {
            let nu_line = snapshot.line_nu(packet.line_cursor);
            let d_curr = packet.doppler_factor(inv_t_exp);
            let raw = (packet.nu * d_curr - nu_line) / packet.nu * crate::constants::C
                / inv_t_exp;

            if raw < 0.0 || raw.is_nan() {
                report_anomaly(
                    packet_index,
                    strict,
                    format!(
                        "negative or NaN line distance {raw} (nu*D={}, nu_line={nu_line})",
                        packet.nu * d_curr
                    ),
                )?;
                0.0f64.max(raw)
            } else {
                raw
            }
        };

        let (event, d) = [
            (Event::Outer, d_out),
            (Event::Inner, d_in),
            (Event::Electron, d_e),
            (Event::Line, d_line),
        ]
        .into_iter()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .expect("non-empty candidate list");

        tracing::trace!(
            packet_index,
            shell = packet.shell,
            ?event,
            d,
            "event dispatch"
        );

        match event {
            Event::Outer => {
                packet.advance(d, estimators, inv_t_exp);

                if packet.shell + 1 < snapshot.shell_count() {
                    packet.shell += 1;
                    packet.recently_crossed_boundary = BoundaryCrossing::Outer;
                } else {
                    return Ok(PacketResult {
                        outcome: Outcome::Escaped,
                        nu: packet.nu,
                        energy: packet.energy,
                    });
                }
            }
            Event::Inner => {
                packet.advance(d, estimators, inv_t_exp);

                if packet.shell > 0 {
                    packet.shell -= 1;
                    packet.recently_crossed_boundary = BoundaryCrossing::Inner;
                } else {
                    return Ok(PacketResult {
                        outcome: Outcome::Reabsorbed,
                        nu: packet.nu,
                        energy: packet.energy,
                    });
                }
            }
            Event::Electron => {
                let doppler = packet.advance(d, estimators, inv_t_exp);
                let nu_cm = packet.nu * doppler;
                let e_cm = packet.energy * doppler;

                packet.mu = rng.draw_isotropic_mu();
                let inverse_doppler = 1.0 / packet.doppler_factor(inv_t_exp);

                packet.nu = nu_cm * inverse_doppler;
                packet.energy = e_cm * inverse_doppler;
                packet.tau_event = rng.draw_tau_event();
                packet.recently_crossed_boundary = BoundaryCrossing::None;

                // REDESIGN FLAG (spec §9/DESIGN.md): re-search rather than leave the cursor stale.
                let nu_comov = packet.nu_comov(inv_t_exp);
                packet.line_cursor = next_line_index(snapshot.line_list_nu(), nu_comov);
                packet.last_line = packet.line_cursor >= snapshot.line_count();
                packet.close_line = false;
            }
            Event::Line => {
                let old_line = packet.line_cursor;
                let tau_line = snapshot.tau_sobolev(packet.shell, old_line);
                let tau_e = SIGMA_THOMSON * snapshot.electron_density(packet.shell) * d;
                let tau_combined = tau_line + tau_e;

                packet.line_cursor += 1;
                if packet.line_cursor >= snapshot.line_count() {
                    packet.line_cursor = snapshot.line_count();
                    packet.last_line = true;
                }

                let mut nu_line = snapshot.line_nu(old_line);

                if packet.tau_event < tau_combined {
                    let doppler_old = packet.advance(d, estimators, inv_t_exp);
                    let e_cm = packet.energy * doppler_old;

                    packet.mu = rng.draw_isotropic_mu();
                    let inverse_doppler = 1.0 / packet.doppler_factor(inv_t_exp);

                    let emission_line = if snapshot.line_interaction() == LineInteraction::Scatter
                    {
                        old_line
                    } else {
                        macro_atom::emit(
                            snapshot,
                            snapshot.macro_upper_level(old_line),
                            packet.shell,
                            rng,
                        )
                    };

                    nu_line = snapshot.line_nu(emission_line);
                    packet.nu = nu_line * inverse_doppler;
                    packet.energy = e_cm * inverse_doppler;
                    packet.line_cursor = emission_line + 1;
                    packet.last_line = packet.line_cursor >= snapshot.line_count();
                    packet.tau_event = rng.draw_tau_event();
                    packet.recently_crossed_boundary = BoundaryCrossing::None;
                } else {
                    packet.tau_event -= tau_line;
                }

                if !packet.last_line {
                    let next_nu = snapshot.line_nu(packet.line_cursor);
                    if ((next_nu - nu_line) / nu_line).abs() < crate::constants::CLOSE_LINE_THRESHOLD
                    {
                        packet.close_line = true;
                    }
                }
            }
        }
    }
}

fn report_anomaly(packet_index: usize, strict: bool, detail: String) -> Result<()> {
    if strict {
        return Err(Error::NumericAnomaly {
            packet: packet_index,
            detail,
        });
    }

    tracing::warn!(packet_index, detail, "numeric anomaly during transport");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{tests::bare_single_shell, LineInteraction, Snapshot, SnapshotInputs, TransitionType};
    use ndarray::Array2;

    fn run_one(
        snapshot: &Snapshot,
        nu: f64,
        mu: f64,
        energy: f64,
        seed: u64,
    ) -> PacketResult {
        let mut estimators = Estimators::zeros(snapshot.shell_count());
        let mut rng = WorkerRng::new(seed, 0);
        transport_packet(snapshot, nu, mu, energy, 0, &mut estimators, &mut rng, true).unwrap()
    }

    #[test]
    fn single_shell_no_lines_no_electrons_always_escapes() {
        let inputs = SnapshotInputs {
            electron_density: vec![1e-30],
            ..bare_single_shell()
        };
        let snapshot = Snapshot::new(inputs).unwrap();

        for seed in 0..20 {
            let result = run_one(&snapshot, 1e15, 0.5, 1.0, seed);
            assert_eq!(result.outcome, Outcome::Escaped);
            assert!(result.nu > 0.0);
            assert!(result.energy > 0.0);
        }
    }

    #[test]
    fn two_shells_no_opacity_mu_minus_one_is_reabsorbed() {
        let inputs = SnapshotInputs {
            r_inner: vec![1e15, 1.5e15],
            r_outer: vec![1.5e15, 2e15],
            v_inner: vec![0.0, 0.0],
            electron_density: vec![1e-30, 1e-30],
            ..two_shell_base()
        };
        let snapshot = Snapshot::new(inputs).unwrap();

        let result = run_one(&snapshot, 1e15, -1.0, 1.0, 0);
        assert_eq!(result.outcome, Outcome::Reabsorbed);
    }

    #[test]
    fn two_shells_no_opacity_mu_plus_one_escapes() {
        let inputs = SnapshotInputs {
            r_inner: vec![1e15, 1.5e15],
            r_outer: vec![1.5e15, 2e15],
            v_inner: vec![0.0, 0.0],
            electron_density: vec![1e-30, 1e-30],
            ..two_shell_base()
        };
        let snapshot = Snapshot::new(inputs).unwrap();

        let result = run_one(&snapshot, 1e15, 1.0, 1.0, 0);
        assert_eq!(result.outcome, Outcome::Escaped);
    }

    fn two_shell_base() -> SnapshotInputs {
        SnapshotInputs {
            r_inner: vec![1e15, 1.5e15],
            r_outer: vec![1.5e15, 2e15],
            v_inner: vec![0.0, 0.0],
            electron_density: vec![1.0, 1.0],
            line_list_nu: vec![],
            tau_sobolev: Array2::zeros((2, 0)),
            line_interaction: LineInteraction::Scatter,
            line2macro_upper: vec![],
            macro_block_refs: vec![0],
            transition_probabilities: Array2::zeros((2, 0)),
            transition_type: vec![],
            transition_destination_level: vec![],
            transition_line_id: vec![],
            time_explosion: 1e6,
        }
    }

    #[test]
    fn strong_scatter_line_interacts_and_randomizes_direction() {
        let inputs = SnapshotInputs {
            line_list_nu: vec![5e14],
            tau_sobolev: Array2::from_elem((1, 1), 1e6),
            line2macro_upper: vec![0],
            ..bare_single_shell()
        };
        let snapshot = Snapshot::new(inputs).unwrap();

        // packet started just blueward of the line with mu = 0 (no Doppler shift, so "comoving"
        // and lab frequency coincide here): must interact.
        let mut saw_negative_mu = false;
        let mut saw_positive_mu = false;

        for seed in 0..64 {
            let mut estimators = Estimators::zeros(1);
            let mut rng = WorkerRng::new(seed, 0);
            let result =
                transport_packet(&snapshot, 5e14 * 1.0000001, 0.0, 1.0, 0, &mut estimators, &mut rng, true)
                    .unwrap();
            assert!(matches!(result.outcome, Outcome::Escaped | Outcome::Reabsorbed));
        }

        // Separately confirm the post-scatter direction sampler covers both signs: this is a
        // property of `WorkerRng::draw_isotropic_mu`, exercised directly rather than by trying to
        // catch a single packet's one scatter.
        let mut rng = WorkerRng::new(99, 0);
        for _ in 0..256 {
            let mu = rng.draw_isotropic_mu();
            if mu < 0.0 {
                saw_negative_mu = true;
            } else {
                saw_positive_mu = true;
            }
        }
        assert!(saw_negative_mu && saw_positive_mu);
    }

    #[test]
    fn macro_mode_two_level_atom_always_emits_configured_line() {
        let inputs = SnapshotInputs {
            line_list_nu: vec![6e14, 5e14],
            tau_sobolev: Array2::from_elem((1, 2), 1e6),
            line_interaction: LineInteraction::Macro,
            line2macro_upper: vec![0, 0],
            macro_block_refs: vec![0, 1],
            transition_probabilities: Array2::from_elem((1, 1), 1.0),
            transition_type: vec![TransitionType::Emission],
            transition_destination_level: vec![0],
            transition_line_id: vec![1],
            ..bare_single_shell()
        };
        let snapshot = Snapshot::new(inputs).unwrap();

        for seed in 0..32 {
            let mut estimators = Estimators::zeros(1);
            let mut rng = WorkerRng::new(seed, 0);
            let result = transport_packet(
                &snapshot,
                6e14 * 1.0000001,
                0.0,
                1.0,
                0,
                &mut estimators,
                &mut rng,
                true,
            )
            .unwrap();
            assert!(matches!(result.outcome, Outcome::Escaped | Outcome::Reabsorbed));
        }
    }

    #[test]
    fn close_line_pair_is_processed_without_extra_geometric_advance() {
        // two lines separated by 1e-9 relative frequency; both at huge tau so the first
        // interaction is certain, after which the close neighbor is immediately checked.
        let nu_a = 6e14;
        let nu_b = nu_a * (1.0 - 5e-10);
        let inputs = SnapshotInputs {
            line_list_nu: vec![nu_a, nu_b],
            tau_sobolev: Array2::from_elem((1, 2), 1e8),
            line2macro_upper: vec![0, 0],
            ..bare_single_shell()
        };
        let snapshot = Snapshot::new(inputs).unwrap();

        let mut estimators = Estimators::zeros(1);
        let mut rng = WorkerRng::new(11, 0);
        let result = transport_packet(
            &snapshot,
            nu_a * 1.0000001,
            0.0,
            1.0,
            0,
            &mut estimators,
            &mut rng,
            true,
        )
        .unwrap();
        assert!(matches!(result.outcome, Outcome::Escaped | Outcome::Reabsorbed));
    }
}
