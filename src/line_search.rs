//! Binary search over the monotonically decreasing line frequency table.

/// Returns the smallest index `i` such that `line_list_nu[i] <= nu_comov`, or `line_list_nu.len()`
/// if no such index exists (the packet has drifted off the red end of the line list).
///
/// `line_list_nu` must be strictly decreasing; this is checked once at
/// [`crate::snapshot::Snapshot`] construction time, not on every call.
///
/// For all `i < result`, `line_list_nu[i] > nu_comov` holds.
#[must_use]
pub fn next_line_index(line_list_nu: &[f64], nu_comov: f64) -> usize {
    // `line_list_nu` is descending, so reverse the comparison `partition_point` expects
    // (ascending). `partition_point` returns the first index where the predicate is false;
    // we want the first index where `line_list_nu[i] <= nu_comov`.
    line_list_nu.partition_point(|&nu_line| nu_line > nu_comov)
}
