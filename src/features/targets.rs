//! Pure series helpers behind the derived AQI columns: lag, change rate,
//! forward-looking rolling targets and mean imputation.

/// Denominator guard for the AQI change rate.
pub const CHANGE_RATE_EPSILON: f64 = 1e-6;

/// Width of the rolling window averaged into each target, in hours.
pub const TARGET_WINDOW: usize = 24;

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// Shifts a series forward by one position; the first element becomes `None`.
pub fn lag1(values: &[Option<f64>]) -> Vec<Option<f64>> {
    std::iter::once(None)
        .chain(values.iter().copied())
        .take(values.len())
        .collect()
}

/// `(current - previous) / (previous + 1e-6)`, `None` wherever either side is missing.
pub fn change_rate(current: &[Option<f64>], previous: &[Option<f64>]) -> Vec<Option<f64>> {
    current
        .iter()
        .zip(previous)
        .map(|(cur, prev)| {
            let (cur, prev) = (present(*cur)?, present(*prev)?);
            Some((cur - prev) / (prev + CHANGE_RATE_EPSILON))
        })
        .collect()
}

/// Shifts `values` backward by `shift` positions and takes a trailing rolling
/// mean of `window` samples, requiring at least `min_periods` present values.
///
/// The element at `t` averages `values[max(t + 1 - window, 0) + shift ..= t + shift]`,
/// clipped to the end of the series. Missing and NaN samples are skipped; a window with
/// fewer than `min_periods` present samples yields `None`.
pub fn forward_rolling_mean(
    values: &[Option<f64>],
    shift: usize,
    window: usize,
    min_periods: usize,
) -> Vec<Option<f64>> {
    let n = values.len();
    (0..n)
        .map(|t| {
            let start = (t + 1).saturating_sub(window) + shift;
            let end = t + shift; // inclusive
            if start >= n {
                return None;
            }
            let (sum, count) = values[start..=end.min(n - 1)]
                .iter()
                .filter_map(|v| present(*v))
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            (count >= min_periods.max(1)).then(|| sum / count as f64)
        })
        .collect()
}

/// Mean of the present values, `None` if there are none.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter_map(|v| present(*v))
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Replaces missing values with the mean of the whole series, leaving the
/// first `keep_leading` positions untouched. A series with no present values
/// is returned unchanged.
pub fn fill_with_mean(values: &[Option<f64>], keep_leading: usize) -> Vec<Option<f64>> {
    let Some(fill) = mean(values) else {
        return values.to_vec();
    };
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if i < keep_leading {
                *v
            } else {
                Some(present(*v).unwrap_or(fill))
            }
        })
        .collect()
}
