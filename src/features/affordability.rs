//! Affordability and structural-pressure features.
//!
//! Payment-based measures use the standard annuity (PMT) formula on a
//! monthly schedule. Ratios with a zero or missing denominator are `None`.

use serde::{Deserialize, Serialize};

use crate::data::{Panel, PanelError};

/// Parameters for payment-based affordability measures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffordabilityParams {
    /// Mortgage term in years.
    pub term_years: u32,
    /// Financed share of the price.
    pub loan_to_value: f64,
    /// Rolling window for the DTI shock z-score (`None` = full sample).
    pub shock_window: Option<usize>,
}

impl Default for AffordabilityParams {
    fn default() -> Self {
        Self {
            term_years: 25,
            loan_to_value: 0.8,
            shock_window: None,
        }
    }
}

/// Monthly payment on `principal` at an annual rate over `term_years`.
pub fn monthly_payment(principal: f64, annual_rate: f64, term_years: u32) -> f64 {
    let r = annual_rate / 12.0;
    let n = f64::from(term_years * 12);

    if r.abs() < 1e-8 {
        return principal / n;
    }

    let factor = (1.0 + r).powf(n);
    principal * r * factor / (factor - 1.0)
}

fn ratio(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

fn elementwise(
    a: &[Option<f64>],
    b: &[Option<f64>],
    f: impl Fn(Option<f64>, Option<f64>) -> Option<f64>,
) -> Vec<Option<f64>> {
    a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect()
}

/// Price over annual income.
pub fn price_to_income(price: &[Option<f64>], income: &[Option<f64>]) -> Vec<Option<f64>> {
    elementwise(price, income, ratio)
}

/// Mortgage payments for each row.
pub fn mortgage_payments(
    price: &[Option<f64>],
    rate: &[Option<f64>],
    params: &AffordabilityParams,
) -> Vec<Option<f64>> {
    elementwise(price, rate, |p, r| {
        Some(monthly_payment(p? * params.loan_to_value, r?, params.term_years))
    })
}

/// Monthly amount over monthly income (annual income / 12).
pub fn share_of_monthly_income(
    monthly: &[Option<f64>],
    income: &[Option<f64>],
) -> Vec<Option<f64>> {
    elementwise(monthly, income, |m, i| ratio(m, i.map(|v| v / 12.0)))
}

/// Full-sample z-score using the sample standard deviation.
pub fn zscore(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    match sample_moments(&present) {
        Some((mean, std)) if std > 0.0 => values.iter().map(|v| v.map(|x| (x - mean) / std)).collect(),
        _ => vec![None; values.len()],
    }
}

/// Rolling z-score over a trailing window of `window` rows.
pub fn rolling_zscore(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| {
            if window == 0 || t + 1 < window {
                return None;
            }
            let slice = &values[t + 1 - window..=t];
            let present: Vec<f64> = slice.iter().flatten().copied().collect();
            if present.len() < window {
                return None;
            }
            let (mean, std) = sample_moments(&present)?;
            if std > 0.0 {
                Some((values[t]? - mean) / std)
            } else {
                None
            }
        })
        .collect()
}

/// Mean and sample (n - 1) standard deviation.
fn sample_moments(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, var.sqrt()))
}

/// Append `dti`, `mortgage_payment`, `pti`, `rent_burden`,
/// `supply_pressure`, `migration_pressure` and `dti_shock`.
pub fn attach_affordability_features(
    panel: &Panel,
    params: &AffordabilityParams,
) -> Result<Panel, PanelError> {
    panel.require(&[
        "price",
        "income",
        "mortgage_rate",
        "rent",
        "permits",
        "inventory",
        "net_migration",
        "population",
    ])?;

    let price = panel.column("price")?;
    let income = panel.column("income")?;

    let dti = price_to_income(price, income);
    let payment = mortgage_payments(price, panel.column("mortgage_rate")?, params);
    let pti = share_of_monthly_income(&payment, income);
    let rent_burden = share_of_monthly_income(panel.column("rent")?, income);
    let supply = elementwise(panel.column("permits")?, panel.column("inventory")?, ratio);
    let migration = elementwise(
        panel.column("net_migration")?,
        panel.column("population")?,
        ratio,
    );
    let shock = match params.shock_window {
        Some(window) => rolling_zscore(&dti, window),
        None => zscore(&dti),
    };

    panel
        .clone()
        .with_column("dti", dti)?
        .with_column("mortgage_payment", payment)?
        .with_column("pti", pti)?
        .with_column("rent_burden", rent_burden)?
        .with_column("supply_pressure", supply)?
        .with_column("migration_pressure", migration)?
        .with_column("dti_shock", shock)
}
