//! Nearest-timestamp ("as-of") matching between two time-indexed series.

/// Index of the element of `sorted` closest to `t`.
///
/// When two candidates are equally close the earlier one wins.
pub(crate) fn nearest_index(sorted: &[i64], t: i64) -> Option<usize> {
    let pos = sorted.partition_point(|&x| x < t);
    let before = pos.checked_sub(1);
    let after = (pos < sorted.len()).then_some(pos);
    match (before, after) {
        (Some(b), Some(a)) => {
            if sorted[a] - t < t - sorted[b] {
                Some(a)
            } else {
                Some(b)
            }
        }
        (b, a) => b.or(a),
    }
}

/// For every left timestamp, the index of the nearest right timestamp.
///
/// `right` must be sorted ascending. A match further away than
/// `tolerance_ms` (when given) is dropped, as is any left row without a
/// timestamp.
pub(crate) fn nearest_indices(
    left: &[Option<i64>],
    right: &[i64],
    tolerance_ms: Option<i64>,
) -> Vec<Option<usize>> {
    left.iter()
        .map(|t| {
            let t = (*t)?;
            nearest_index(right, t)
                .filter(|&i| tolerance_ms.map_or(true, |tol| (right[i] - t).abs() <= tol))
        })
        .collect()
}
