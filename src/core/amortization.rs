/// Fixed-rate repayment mortgage payment per month.
///
/// Returns 0 when there is nothing to amortize: a non-positive principal,
/// rate or term. Unrounded; currency rounding belongs to the presentation.
pub fn compute_monthly_payment(principal: f64, annual_rate_percent: f64, term_years: f64) -> f64 {
    if !(principal > 0.0 && annual_rate_percent > 0.0 && term_years > 0.0) {
        return 0.0;
    }

    let monthly_rate = annual_rate_percent / 12.0 / 100.0;
    let payments = term_years * 12.0;
    let growth = (1.0 + monthly_rate).powf(payments);

    principal * monthly_rate * growth / (growth - 1.0)
}
