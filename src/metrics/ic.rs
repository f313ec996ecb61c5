//! Information coefficient of a signal against forward returns.
//!
//! The IC is the Pearson correlation over rows where both series are
//! present. Significance uses the Student t distribution with `n - 2`
//! degrees of freedom.

use std::collections::BTreeMap;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Correlation with its significance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IcResult {
    pub ic: f64,
    /// Jointly present pairs.
    pub n: usize,
    pub t_stat: f64,
    /// Two-sided.
    pub p_value: f64,
}

fn pairs(x: &[Option<f64>], y: &[Option<f64>]) -> Vec<(f64, f64)> {
    x.iter()
        .zip(y)
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if !a.is_nan() && !b.is_nan() => Some((*a, *b)),
            _ => None,
        })
        .collect()
}

fn pearson(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in pairs {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Pearson IC of `signal` against `forward` with t-statistic and p-value.
pub fn information_coefficient(signal: &[Option<f64>], forward: &[Option<f64>]) -> IcResult {
    let joint = pairs(signal, forward);
    let n = joint.len();
    let ic = pearson(&joint);

    let (t_stat, p_value) = if n < 3 || ic.is_nan() {
        (f64::NAN, f64::NAN)
    } else if ic.abs() >= 1.0 {
        (ic.signum() * f64::INFINITY, 0.0)
    } else {
        let dof = (n - 2) as f64;
        let t = ic * (dof / (1.0 - ic * ic)).sqrt();
        let p = StudentsT::new(0.0, 1.0, dof)
            .map(|dist| 2.0 * (1.0 - dist.cdf(t.abs())))
            .unwrap_or(f64::NAN);
        (t, p)
    };

    IcResult {
        ic,
        n,
        t_stat,
        p_value,
    }
}

/// IC within each regime class present in `regimes`.
pub fn ic_by_regime(
    signal: &[Option<f64>],
    forward: &[Option<f64>],
    regimes: &[Option<f64>],
) -> BTreeMap<i64, IcResult> {
    let mut groups: BTreeMap<i64, (Vec<Option<f64>>, Vec<Option<f64>>)> = BTreeMap::new();
    for ((s, f), r) in signal.iter().zip(forward).zip(regimes) {
        let Some(r) = r.filter(|v| v.fract() == 0.0) else {
            continue;
        };
        let group = groups.entry(r as i64).or_default();
        group.0.push(*s);
        group.1.push(*f);
    }

    groups
        .into_iter()
        .map(|(regime, (s, f))| (regime, information_coefficient(&s, &f)))
        .collect()
}

/// Trailing-window correlation. A window with any missing value is `None`.
pub fn rolling_ic(signal: &[Option<f64>], forward: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let joint: Vec<Option<(f64, f64)>> = signal
        .iter()
        .zip(forward)
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if !a.is_nan() && !b.is_nan() => Some((*a, *b)),
            _ => None,
        })
        .collect();

    (0..joint.len())
        .map(|t| {
            if window < 2 || t + 1 < window {
                return None;
            }
            let slice: Option<Vec<(f64, f64)>> = joint[t + 1 - window..=t].iter().copied().collect();
            let r = pearson(&slice?);
            if r.is_nan() {
                None
            } else {
                Some(r)
            }
        })
        .collect()
}

/// Rolling IC computed on the rows of one regime only, then placed back at
/// those rows' positions. Rows of other regimes are `None`.
pub fn rolling_ic_in_regime(
    signal: &[Option<f64>],
    forward: &[Option<f64>],
    regimes: &[Option<f64>],
    regime: i64,
    window: usize,
) -> Vec<Option<f64>> {
    let positions: Vec<usize> = regimes
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_some_and(|v| v.fract() == 0.0 && v as i64 == regime))
        .map(|(i, _)| i)
        .collect();

    let sub_signal: Vec<Option<f64>> = positions.iter().map(|&i| signal.get(i).copied().flatten()).collect();
    let sub_forward: Vec<Option<f64>> = positions.iter().map(|&i| forward.get(i).copied().flatten()).collect();

    let mut out = vec![None; regimes.len()];
    for (&i, value) in positions.iter().zip(rolling_ic(&sub_signal, &sub_forward, window)) {
        out[i] = value;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    #[test]
    fn test_perfect_correlation() {
        let r = information_coefficient(&some(&[1.0, 2.0, 3.0, 4.0]), &some(&[2.0, 4.0, 6.0, 8.0]));
        assert_relative_eq!(r.ic, 1.0);
        assert_eq!(r.n, 4);
        assert_eq!(r.p_value, 0.0);
    }

    #[test]
    fn test_ic_skips_missing_pairs() {
        let x = vec![Some(1.0), None, Some(2.0), Some(3.0), Some(4.0)];
        let y = vec![Some(4.0), Some(0.0), Some(3.0), None, Some(1.0)];
        let r = information_coefficient(&x, &y);
        assert_eq!(r.n, 3);
        assert!(r.ic < -0.9);
    }

    #[test]
    fn test_ic_significance() {
        // r = 0.8 on 5 points: t = 0.8 * sqrt(3 / 0.36)
        let x = some(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = some(&[1.0, 3.0, 2.0, 5.0, 4.0]);
        let r = information_coefficient(&x, &y);
        assert_relative_eq!(r.ic, 0.8, epsilon = 1e-12);
        assert_relative_eq!(r.t_stat, 0.8 * (3.0_f64 / 0.36).sqrt(), epsilon = 1e-9);
        assert!(r.p_value > 0.05 && r.p_value < 0.2);
    }

    #[test]
    fn test_constant_series_is_nan() {
        let r = information_coefficient(&some(&[1.0, 1.0, 1.0]), &some(&[1.0, 2.0, 3.0]));
        assert!(r.ic.is_nan());
        assert!(r.p_value.is_nan());
    }

    #[test]
    fn test_ic_by_regime() {
        let x = some(&[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        let y = some(&[1.0, 2.0, 3.0, 3.0, 2.0, 1.0]);
        let regimes = some(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);

        let by = ic_by_regime(&x, &y, &regimes);
        assert_eq!(by.len(), 2);
        assert_relative_eq!(by[&0].ic, 1.0);
        assert_relative_eq!(by[&1].ic, -1.0);
    }

    #[test]
    fn test_rolling_ic_window() {
        let x = some(&[1.0, 2.0, 3.0, 4.0]);
        let y = vec![Some(1.0), Some(2.0), Some(3.0), None];
        let r = rolling_ic(&x, &y, 3);
        assert_eq!(r[0], None);
        assert_eq!(r[1], None);
        assert_relative_eq!(r[2].unwrap(), 1.0);
        assert_eq!(r[3], None);
    }

    #[test]
    fn test_rolling_ic_in_regime_skips_other_rows() {
        // regime 1 rows break the pattern; the subset window never sees them
        let x = some(&[1.0, 10.0, 2.0, 20.0, 3.0, 5.0]);
        let y = some(&[1.0, -5.0, 2.0, 7.0, 3.0, -1.0]);
        let regimes = some(&[0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);

        let r = rolling_ic_in_regime(&x, &y, &regimes, 0, 3);
        assert_eq!(r.len(), 6);
        assert_eq!(r[0], None);
        assert_eq!(r[1], None);
        assert_eq!(r[2], None);
        assert_eq!(r[3], None);
        assert_relative_eq!(r[4].unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(r[5], None);

        // the full-sample window over the same rows mixes regimes
        let all = rolling_ic(&x, &y, 3);
        assert!(all[4].is_some_and(|v| v < 1.0));
    }
}
