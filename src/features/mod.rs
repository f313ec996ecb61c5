//! Feature construction.
//!
//! - Forward log returns and lagged trend changes over an explicit horizon
//! - Affordability ratios: DTI, payment-to-income, rent burden
//! - Structural pressure: supply and migration

pub mod affordability;
pub mod forward;

pub use affordability::{attach_affordability_features, monthly_payment, AffordabilityParams};
pub use forward::{forward_log_return, lagged_change, prepare_panel, PreparationSpec, TrendFeature};
