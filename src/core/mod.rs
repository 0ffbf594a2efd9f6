mod amortization;
mod engine;
mod tax;
mod types;

pub use amortization::compute_monthly_payment;
pub use engine::{Engine, reconcile, reconcile_with};
pub use tax::{SURCHARGE_RATE, TaxBand, TaxBandTable, TaxBreakdown, TaxTableError, compute_tax};
pub use types::{DepositPolicy, DerivedOutputs, EngineConfig, Field, PrimaryInputs};
pub(crate) use types::clamp_non_negative;
