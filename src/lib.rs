//! A Monte Carlo packet-transport kernel for homologously expanding, spherically symmetric
//! supernova ejecta.
//!
//! A packet population is propagated through a stratified, radially discretized atmosphere
//! ([`snapshot::Snapshot`]) by [`event_loop::transport_packet`], selecting at each step the
//! smallest of four candidate distances — outer boundary, inner boundary, electron scatter, and
//! line interaction — until the packet escapes or is reabsorbed. [`transport::run`] fans a whole
//! population out across a `rayon` thread pool and reduces the resulting radiation-field
//! estimators.
//!
//! ```
//! use ejecta_transport::{
//!     snapshot::{LineInteraction, Snapshot, SnapshotInputs},
//!     transport::{self, TransportConfig},
//! };
//! use ndarray::Array2;
//!
//! let snapshot = Snapshot::new(SnapshotInputs {
//!     r_inner: vec![1e15],
//!     r_outer: vec![2e15],
//!     v_inner: vec![0.0],
//!     electron_density: vec![1e8],
//!     line_list_nu: vec![],
//!     tau_sobolev: Array2::zeros((1, 0)),
//!     line_interaction: LineInteraction::Scatter,
//!     line2macro_upper: vec![],
//!     macro_block_refs: vec![0],
//!     transition_probabilities: Array2::zeros((1, 0)),
//!     transition_type: vec![],
//!     transition_destination_level: vec![],
//!     transition_line_id: vec![],
//!     time_explosion: 1e6,
//! })
//! .unwrap();
//!
//! let config = TransportConfig { threads: Some(1), seed: 42, strict: true };
//! let result = transport::run(&snapshot, &[1e15], &[0.5], &[1.0], config).unwrap();
//! assert_eq!(result.escaped_count + result.reabsorbed_count, 1);
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_lines)]

pub mod constants;
pub mod error;
pub mod estimators;
pub mod event_loop;
pub mod geometry;
pub mod line_search;
pub mod macro_atom;
pub mod packet;
pub mod rng;
pub mod snapshot;
pub mod transport;

pub use error::{Error, Result};
