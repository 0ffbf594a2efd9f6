use super::amortization::compute_monthly_payment;
use super::types::{DepositPolicy, DerivedOutputs, EngineConfig, PrimaryInputs};

/// Pure reconciliation of a purchase and sale. Holds configuration only;
/// nothing is retained between calls.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reconcile(&self, inputs: &PrimaryInputs) -> DerivedOutputs {
        reconcile_with(inputs, &self.config)
    }
}

pub fn reconcile(inputs: &PrimaryInputs) -> DerivedOutputs {
    reconcile_with(inputs, &EngineConfig::default())
}

pub fn reconcile_with(inputs: &PrimaryInputs, config: &EngineConfig) -> DerivedOutputs {
    let overbid_amount = inputs.bid_amount - inputs.home_report_value;

    let tax = config
        .tax_bands
        .breakdown(inputs.bid_amount, config.surcharge_applicable);

    let cash_used_before_purchase =
        overbid_amount.max(0.0) + inputs.buying_fees_upfront + inputs.selling_fees_upfront;

    let equity_from_sale =
        inputs.expected_sale_value - inputs.existing_mortgage - inputs.selling_fees_at_sale;
    let total_funds_after_sale = inputs.cash_available + equity_from_sale;

    let required_deposit = match config.deposit_policy {
        DepositPolicy::FundsDriven => {
            let available_for_deposit = total_funds_after_sale
                - cash_used_before_purchase
                - tax.total
                - inputs.buying_fees_at_sale;
            available_for_deposit.max(0.0)
        }
        DepositPolicy::FixedPercentage(pct) => inputs.home_report_value * pct / 100.0,
    };

    // Negative when the deposit exceeds the valuation.
    let mortgage_amount = inputs.home_report_value - required_deposit;
    let monthly_payment = compute_monthly_payment(
        mortgage_amount,
        inputs.interest_rate_percent,
        inputs.mortgage_term_years,
    );

    let (loan_to_value_percent, overbid_percent) = if inputs.home_report_value > 0.0 {
        (
            mortgage_amount / inputs.home_report_value * 100.0,
            overbid_amount / inputs.home_report_value * 100.0,
        )
    } else {
        (0.0, 0.0)
    };

    let remaining_cash = total_funds_after_sale
        - cash_used_before_purchase
        - required_deposit
        - tax.total
        - inputs.buying_fees_at_sale;

    let cash_needed_at_purchase = required_deposit + tax.total + inputs.buying_fees_at_sale;
    let cash_shortfall =
        cash_used_before_purchase + cash_needed_at_purchase - inputs.cash_available;

    DerivedOutputs {
        overbid_amount,
        standard_tax: tax.standard,
        surcharge_tax: tax.surcharge,
        tax_liability: tax.total,
        cash_used_before_purchase,
        equity_from_sale,
        total_funds_after_sale,
        required_deposit,
        mortgage_amount,
        monthly_payment,
        loan_to_value_percent,
        overbid_percent,
        remaining_cash,
        cash_needed_at_purchase,
        cash_shortfall,
        bridge_loan_required: cash_shortfall.max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tax::{TaxBand, TaxBandTable};
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn fixed_engine(pct: f64) -> Engine {
        Engine::new(EngineConfig {
            deposit_policy: DepositPolicy::FixedPercentage(pct),
            ..EngineConfig::default()
        })
    }

    #[test]
    fn oracle_defaults_under_funds_driven_policy() {
        let out = reconcile(&PrimaryInputs::default());

        assert_approx(out.overbid_amount, 15_000.0);
        assert_approx(out.tax_liability, 2_850.0);
        assert_approx(out.surcharge_tax, 0.0);
        assert_approx(out.cash_used_before_purchase, 16_000.0);
        assert_approx(out.equity_from_sale, 58_500.0);
        assert_approx(out.total_funds_after_sale, 78_500.0);
        assert_approx(out.required_deposit, 58_150.0);
        assert_approx(out.mortgage_amount, 191_850.0);
        assert_approx(out.loan_to_value_percent, 76.74);
        assert_approx(out.overbid_percent, 6.0);
        assert_approx(out.remaining_cash, 0.0);
        assert_approx(out.cash_needed_at_purchase, 62_500.0);
        assert_approx(out.cash_shortfall, 58_500.0);
        assert_approx(out.bridge_loan_required, 58_500.0);
        assert!((out.monthly_payment - 1_066.36).abs() < 0.01);
    }

    #[test]
    fn oracle_defaults_under_fixed_percentage_policy() {
        let out = fixed_engine(20.0).reconcile(&PrimaryInputs::default());

        assert_approx(out.required_deposit, 50_000.0);
        assert_approx(out.mortgage_amount, 200_000.0);
        assert_approx(out.loan_to_value_percent, 80.0);
        assert_approx(out.remaining_cash, 8_150.0);
        assert_approx(out.cash_needed_at_purchase, 54_350.0);
        assert_approx(out.cash_shortfall, 50_350.0);
        assert!((out.monthly_payment - 1_111.66).abs() < 0.01);
    }

    #[test]
    fn surcharge_reduces_deposit_under_funds_driven_policy() {
        let engine = Engine::new(EngineConfig {
            surcharge_applicable: true,
            ..EngineConfig::default()
        });
        let out = engine.reconcile(&PrimaryInputs::default());
        assert_approx(out.surcharge_tax, 15_900.0);
        assert_approx(out.tax_liability, 18_750.0);
        assert_approx(out.required_deposit, 58_150.0 - 15_900.0);
        assert_approx(out.remaining_cash, 0.0);
    }

    #[test]
    fn insufficient_funds_clamp_deposit_and_surface_deficit() {
        let inputs = PrimaryInputs {
            expected_sale_value: 100_000.0,
            cash_available: 0.0,
            ..PrimaryInputs::default()
        };
        let out = reconcile(&inputs);
        assert_approx(out.equity_from_sale, -21_500.0);
        assert_approx(out.required_deposit, 0.0);
        assert_approx(out.mortgage_amount, 250_000.0);
        assert_approx(out.loan_to_value_percent, 100.0);
        assert!(out.remaining_cash < 0.0);
        assert_approx(out.remaining_cash, -21_500.0 - 16_000.0 - 2_850.0 - 1_500.0);
    }

    #[test]
    fn over_funding_yields_negative_mortgage_and_no_payment() {
        let inputs = PrimaryInputs {
            cash_available: 400_000.0,
            ..PrimaryInputs::default()
        };
        let out = reconcile(&inputs);
        assert!(out.mortgage_amount < 0.0);
        assert!(out.loan_to_value_percent < 0.0);
        assert_eq!(out.monthly_payment, 0.0);
    }

    #[test]
    fn underbid_is_not_charged_as_upfront_cash() {
        let inputs = PrimaryInputs {
            bid_amount: 240_000.0,
            ..PrimaryInputs::default()
        };
        let out = reconcile(&inputs);
        assert_approx(out.overbid_amount, -10_000.0);
        assert_approx(out.overbid_percent, -4.0);
        assert_approx(out.cash_used_before_purchase, 1_000.0);
    }

    #[test]
    fn zero_valuation_guards_percentages() {
        let inputs = PrimaryInputs {
            home_report_value: 0.0,
            ..PrimaryInputs::default()
        };
        let out = reconcile(&inputs);
        assert_eq!(out.loan_to_value_percent, 0.0);
        assert_eq!(out.overbid_percent, 0.0);
        assert_eq!(out.monthly_payment, 0.0);
    }

    #[test]
    fn engine_uses_injected_tax_table() {
        let table = TaxBandTable::new(vec![TaxBand {
            upper_threshold: f64::INFINITY,
            rate: 0.0,
        }])
        .expect("valid table");
        let engine = Engine::new(EngineConfig {
            tax_bands: table,
            ..EngineConfig::default()
        });
        let out = engine.reconcile(&PrimaryInputs::default());
        assert_approx(out.tax_liability, 0.0);
        assert_approx(out.required_deposit, 58_150.0 + 2_850.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_funds_driven_closes_to_zero_when_funds_suffice(
            hrv in 0u32..1_500_000,
            bid in 0u32..1_500_000,
            bfu in 0u32..5_000,
            bfs in 0u32..5_000,
            esv in 0u32..1_000_000,
            em in 0u32..800_000,
            sfu in 0u32..5_000,
            sfs in 0u32..5_000,
            cash in 0u32..500_000,
            surcharge in proptest::bool::ANY
        ) {
            let inputs = PrimaryInputs {
                home_report_value: hrv as f64,
                bid_amount: bid as f64,
                buying_fees_upfront: bfu as f64,
                buying_fees_at_sale: bfs as f64,
                expected_sale_value: esv as f64,
                existing_mortgage: em as f64,
                selling_fees_upfront: sfu as f64,
                selling_fees_at_sale: sfs as f64,
                cash_available: cash as f64,
                ..PrimaryInputs::default()
            };
            let engine = Engine::new(EngineConfig {
                surcharge_applicable: surcharge,
                ..EngineConfig::default()
            });
            let out = engine.reconcile(&inputs);

            prop_assert!(out.required_deposit >= 0.0);
            prop_assert!(out.monthly_payment >= 0.0);
            prop_assert!(out.remaining_cash <= 1e-6);
            if out.required_deposit > 0.0 {
                prop_assert!(out.remaining_cash.abs() <= 1e-6);
            }
            prop_assert!(
                (out.mortgage_amount + out.required_deposit - inputs.home_report_value).abs() <= 1e-6
            );
        }

        #[test]
        fn prop_reconcile_is_deterministic(cash in 0u32..300_000, bid in 0u32..900_000) {
            let inputs = PrimaryInputs {
                cash_available: cash as f64,
                bid_amount: bid as f64,
                ..PrimaryInputs::default()
            };
            prop_assert!(reconcile(&inputs) == reconcile(&inputs));
        }
    }
}
