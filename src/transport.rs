//! The parallel driver: fans a packet population out across a `rayon` thread pool, runs each
//! packet's [`crate::event_loop`] to completion, and reduces the per-worker estimator buffers.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::estimators::Estimators;
use crate::event_loop::{self, Outcome};
use crate::snapshot::Snapshot;

/// Run-level configuration, independent of the snapshot and packet source.
///
/// Not a config *file* format — constructed directly by the caller and threaded into the
/// `rayon::ThreadPool` build, the per-worker RNG seeding, and the numeric-anomaly policy.
#[derive(Clone, Copy, Debug)]
pub struct TransportConfig {
    /// Worker thread count. `None` defers to `rayon`'s default (usually the core count).
    pub threads: Option<usize>,
    /// Run-level seed mixed with each worker's index to derive its RNG stream.
    pub seed: u64,
    /// When set, a numeric anomaly during transport aborts the run with
    /// [`Error::NumericAnomaly`] instead of being logged and absorbed.
    pub strict: bool,
}

/// Aggregate outcome of a completed run: the per-packet results plus the reduced radiation-field
/// estimators and summary counters.
#[derive(Debug)]
pub struct TransportResult {
    /// Per-packet output frequency, lab frame. Negative indicates reabsorption (§6).
    pub output_nu: Vec<f64>,
    /// Per-packet output energy, lab frame. Negative indicates reabsorption (§6).
    pub output_energy: Vec<f64>,
    /// Reduced mean-intensity-like estimator, one entry per shell.
    pub j: Vec<f64>,
    /// Reduced frequency-weighted estimator, one entry per shell.
    pub nubar: Vec<f64>,
    /// Number of packets that escaped through the outer boundary.
    pub escaped_count: usize,
    /// Number of packets reabsorbed at the inner boundary.
    pub reabsorbed_count: usize,
}

/// Transports a full packet population through `snapshot` according to `config`.
///
/// `packet_nu`, `packet_mu`, and `packet_energy` must be equal length; each triple describes one
/// packet's initial state at the base of the ejecta.
///
/// # Errors
///
/// Returns [`Error::NumericAnomaly`] if `config.strict` is set and any packet's transport hits a
/// numeric anomaly (§7). The run is aborted as soon as any worker observes the first such error;
/// packets already completed by other workers are discarded along with it.
///
/// # Panics
///
/// Panics if `packet_nu`, `packet_mu`, and `packet_energy` are not the same length, or if building
/// the requested `rayon::ThreadPool` fails (this only happens under severe resource exhaustion).
pub fn run(
    snapshot: &Snapshot,
    packet_nu: &[f64],
    packet_mu: &[f64],
    packet_energy: &[f64],
    config: TransportConfig,
) -> Result<TransportResult> {
    assert_eq!(packet_nu.len(), packet_mu.len(), "packet_nu/packet_mu length mismatch");
    assert_eq!(packet_nu.len(), packet_energy.len(), "packet_nu/packet_energy length mismatch");

    let packet_count = packet_nu.len();
    let shells = snapshot.shell_count();

    let mut pool_builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = config.threads {
        pool_builder = pool_builder.num_threads(threads);
    }
    let pool = pool_builder
        .build()
        .expect("failed to build the transport thread pool");

    let worker_count = pool.current_num_threads().max(1);

    tracing::info!(
        packet_count,
        shells,
        worker_count,
        strict = config.strict,
        "starting transport run"
    );

    let (outputs, estimators, error) = pool.install(|| {
        (0..packet_count)
            .into_par_iter()
            .fold(
                || (Vec::new(), Estimators::zeros(shells), None::<Error>),
                |(mut outputs, mut acc, mut first_error), i| {
                    if first_error.is_some() {
                        return (outputs, acc, first_error);
                    }

                    // Keyed by packet index rather than `rayon::current_thread_index()`: a fold
                    // task can be split and its work stolen mid-range, so there is no stable
                    // "this worker's packets" identity to hang a persistent stream off of. Keying
                    // per packet instead gives a stronger guarantee than the per-worker scheme
                    // implies — the result is independent of thread count, not just reproducible
                    // for a fixed one.
                    let mut rng = crate::rng::WorkerRng::new(config.seed, i as u64);

                    match event_loop::transport_packet(
                        snapshot,
                        packet_nu[i],
                        packet_mu[i],
                        packet_energy[i],
                        i,
                        &mut acc,
                        &mut rng,
                        config.strict,
                    ) {
                        Ok(result) => outputs.push((i, result)),
                        Err(err) => first_error = Some(err),
                    }

                    (outputs, acc, first_error)
                },
            )
            .reduce(
                || (Vec::new(), Estimators::zeros(shells), None::<Error>),
                |(mut outputs_a, mut acc_a, err_a), (outputs_b, acc_b, err_b)| {
                    outputs_a.extend(outputs_b);
                    acc_a.merge(&acc_b);
                    (outputs_a, acc_a, err_a.or(err_b))
                },
            )
    });

    if let Some(err) = error {
        return Err(err);
    }

    let mut output_nu = vec![0.0; packet_count];
    let mut output_energy = vec![0.0; packet_count];
    let mut escaped_count = 0;
    let mut reabsorbed_count = 0;

    for (i, result) in outputs {
        match result.outcome {
            Outcome::Escaped => {
                output_nu[i] = result.nu;
                output_energy[i] = result.energy;
                escaped_count += 1;
            }
            Outcome::Reabsorbed => {
                output_nu[i] = -result.nu;
                output_energy[i] = -result.energy;
                reabsorbed_count += 1;
            }
        }
    }

    tracing::info!(escaped_count, reabsorbed_count, "transport run complete");

    Ok(TransportResult {
        output_nu,
        output_energy,
        j: estimators.j().to_vec(),
        nubar: estimators.nubar().to_vec(),
        escaped_count,
        reabsorbed_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{tests::bare_single_shell, SnapshotInputs};

    fn escape_only_snapshot() -> Snapshot {
        let inputs = SnapshotInputs {
            electron_density: vec![1e-30],
            ..bare_single_shell()
        };
        Snapshot::new(inputs).unwrap()
    }

    #[test]
    fn every_packet_is_accounted_for_exactly_once() {
        let snapshot = escape_only_snapshot();
        let n = 200;
        let nu = vec![1e15; n];
        let mu: Vec<f64> = (0..n).map(|i| 0.1 + 0.01 * (i as f64 % 5.0)).collect();
        let energy = vec![1.0; n];

        let config = TransportConfig {
            threads: Some(4),
            seed: 7,
            strict: true,
        };

        let result = run(&snapshot, &nu, &mu, &energy, config).unwrap();

        assert_eq!(result.output_nu.len(), n);
        assert_eq!(result.escaped_count + result.reabsorbed_count, n);
        assert_eq!(result.escaped_count, n);
        for &v in &result.output_nu {
            assert!(v > 0.0);
        }
    }

    #[test]
    fn thread_count_does_not_change_the_escape_reabsorb_split() {
        let snapshot = escape_only_snapshot();
        let n = 64;
        let nu = vec![1e15; n];
        let mu: Vec<f64> = (0..n).map(|i| -0.5 + (i as f64) / (n as f64)).collect();
        let energy = vec![2.0; n];

        let one_thread = run(
            &snapshot,
            &nu,
            &mu,
            &energy,
            TransportConfig { threads: Some(1), seed: 3, strict: true },
        )
        .unwrap();

        let many_threads = run(
            &snapshot,
            &nu,
            &mu,
            &energy,
            TransportConfig { threads: Some(4), seed: 3, strict: true },
        )
        .unwrap();

        assert_eq!(one_thread.escaped_count, many_threads.escaped_count);
        assert_eq!(one_thread.reabsorbed_count, many_threads.reabsorbed_count);
    }

    #[test]
    fn estimators_are_non_negative_and_finite() {
        let snapshot = escape_only_snapshot();
        let n = 32;
        let nu = vec![1e15; n];
        let mu = vec![0.2; n];
        let energy = vec![1.0; n];

        let result = run(
            &snapshot,
            &nu,
            &mu,
            &energy,
            TransportConfig { threads: Some(2), seed: 1, strict: true },
        )
        .unwrap();

        for &j in &result.j {
            assert!(j.is_finite() && j >= 0.0);
        }
        for &nubar in &result.nubar {
            assert!(nubar.is_finite() && nubar >= 0.0);
        }
    }

    #[test]
    #[allow(clippy::unnecessary_wraps)]
    fn mismatched_lengths_panic() {
        let snapshot = escape_only_snapshot();
        let result = std::panic::catch_unwind(|| {
            run(
                &snapshot,
                &[1.0, 2.0],
                &[0.1],
                &[1.0, 1.0],
                TransportConfig { threads: Some(1), seed: 0, strict: true },
            )
        });
        assert!(result.is_err());
    }
}
