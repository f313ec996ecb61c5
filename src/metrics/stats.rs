//! Descriptive statistics on return series.
//!
//! NaN values are dropped before every computation. The standard deviation
//! is the population one (divide by `n`), matching how strategy returns are
//! scored during threshold selection.

/// Finite values of `values`, in order.
pub fn present(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Arithmetic mean; NaN when empty.
pub fn mean(values: &[f64]) -> f64 {
    let xs = present(values);
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation; NaN when empty.
pub fn population_std(values: &[f64]) -> f64 {
    let xs = present(values);
    if xs.is_empty() {
        return f64::NAN;
    }
    let n = xs.len() as f64;
    let m = xs.iter().sum::<f64>() / n;
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n).sqrt()
}

/// Mean over population std. NaN when the std is zero or undefined.
pub fn sharpe(values: &[f64]) -> f64 {
    let std = population_std(values);
    if std == 0.0 || std.is_nan() {
        return f64::NAN;
    }
    mean(values) / std
}

/// Empirical quantile with linear interpolation between order statistics
/// (`pos = q * (n - 1)`). NaN for an empty sample.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut xs = present(values);
    xs.sort_by(f64::total_cmp);
    quantile_sorted(&xs, q)
}

/// [`quantile`] on an already sorted, NaN-free slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() || q.is_nan() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Minimum of the finite values; NaN when empty.
pub fn min(values: &[f64]) -> f64 {
    present(values).into_iter().reduce(f64::min).unwrap_or(f64::NAN)
}

/// Maximum of the finite values; NaN when empty.
pub fn max(values: &[f64]) -> f64 {
    present(values).into_iter().reduce(f64::max).unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quantile_linear_interpolation() {
        let xs = [4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(quantile(&xs, 0.0), 1.0);
        assert_relative_eq!(quantile(&xs, 0.5), 2.5);
        assert_relative_eq!(quantile(&xs, 0.8), 3.4, epsilon = 1e-12);
        assert_relative_eq!(quantile(&xs, 1.0), 4.0);
    }

    #[test]
    fn test_quantile_skips_nan_and_handles_empty() {
        assert_relative_eq!(quantile(&[f64::NAN, 2.0, 4.0], 0.5), 3.0);
        assert!(quantile(&[], 0.5).is_nan());
        assert!(quantile(&[f64::NAN], 0.5).is_nan());
    }

    #[test]
    fn test_population_std() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(population_std(&xs), 2.0);
        assert_relative_eq!(mean(&xs), 5.0);
    }

    #[test]
    fn test_sharpe_zero_std_is_nan() {
        assert!(sharpe(&[0.0, 0.0, 0.0]).is_nan());
        assert!(sharpe(&[]).is_nan());
        assert_relative_eq!(sharpe(&[1.0, 3.0]), 2.0);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min(&[3.0, f64::NAN, -1.0]), -1.0);
        assert_eq!(max(&[3.0, f64::NAN, -1.0]), 3.0);
        assert!(min(&[]).is_nan());
    }
}
