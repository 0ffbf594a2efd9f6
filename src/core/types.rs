use serde::{Deserialize, Serialize};

use super::tax::TaxBandTable;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrimaryInputs {
    pub home_report_value: f64,
    pub bid_amount: f64,
    pub buying_fees_upfront: f64,
    pub buying_fees_at_sale: f64,
    pub expected_sale_value: f64,
    pub existing_mortgage: f64,
    pub selling_fees_upfront: f64,
    pub selling_fees_at_sale: f64,
    pub cash_available: f64,
    pub interest_rate_percent: f64,
    pub mortgage_term_years: f64,
}

impl Default for PrimaryInputs {
    fn default() -> Self {
        Self {
            home_report_value: 250_000.0,
            bid_amount: 265_000.0,
            buying_fees_upfront: 500.0,
            buying_fees_at_sale: 1_500.0,
            expected_sale_value: 180_000.0,
            existing_mortgage: 120_000.0,
            selling_fees_upfront: 500.0,
            selling_fees_at_sale: 1_500.0,
            cash_available: 20_000.0,
            interest_rate_percent: 4.5,
            mortgage_term_years: 25.0,
        }
    }
}

impl PrimaryInputs {
    /// Replaces negative or non-finite fields with zero.
    pub fn clamped(mut self) -> Self {
        for field in Field::ALL {
            let value = field.get(&self);
            field.set(&mut self, clamp_non_negative(value));
        }
        self
    }
}

pub(crate) fn clamp_non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// One primary input, with its full record name and its short transport key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Field {
    HomeReportValue,
    BidAmount,
    BuyingFeesUpfront,
    BuyingFeesAtSale,
    ExpectedSaleValue,
    ExistingMortgage,
    SellingFeesUpfront,
    SellingFeesAtSale,
    CashAvailable,
    InterestRatePercent,
    MortgageTermYears,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::HomeReportValue,
        Field::BidAmount,
        Field::BuyingFeesUpfront,
        Field::BuyingFeesAtSale,
        Field::ExpectedSaleValue,
        Field::ExistingMortgage,
        Field::SellingFeesUpfront,
        Field::SellingFeesAtSale,
        Field::CashAvailable,
        Field::InterestRatePercent,
        Field::MortgageTermYears,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::HomeReportValue => "homeReportValue",
            Field::BidAmount => "bidAmount",
            Field::BuyingFeesUpfront => "buyingFeesUpfront",
            Field::BuyingFeesAtSale => "buyingFeesAtSale",
            Field::ExpectedSaleValue => "expectedSaleValue",
            Field::ExistingMortgage => "existingMortgage",
            Field::SellingFeesUpfront => "sellingFeesUpfront",
            Field::SellingFeesAtSale => "sellingFeesAtSale",
            Field::CashAvailable => "cashAvailable",
            Field::InterestRatePercent => "interestRatePercent",
            Field::MortgageTermYears => "mortgageTermYears",
        }
    }

    pub fn short_key(self) -> &'static str {
        match self {
            Field::HomeReportValue => "hrv",
            Field::BidAmount => "bid",
            Field::BuyingFeesUpfront => "bsfu",
            Field::BuyingFeesAtSale => "bsfs",
            Field::ExpectedSaleValue => "esv",
            Field::ExistingMortgage => "em",
            Field::SellingFeesUpfront => "ssfu",
            Field::SellingFeesAtSale => "ssfs",
            Field::CashAvailable => "cash",
            Field::InterestRatePercent => "ir",
            Field::MortgageTermYears => "mt",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn from_short_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.short_key() == key)
    }

    pub fn get(self, inputs: &PrimaryInputs) -> f64 {
        match self {
            Field::HomeReportValue => inputs.home_report_value,
            Field::BidAmount => inputs.bid_amount,
            Field::BuyingFeesUpfront => inputs.buying_fees_upfront,
            Field::BuyingFeesAtSale => inputs.buying_fees_at_sale,
            Field::ExpectedSaleValue => inputs.expected_sale_value,
            Field::ExistingMortgage => inputs.existing_mortgage,
            Field::SellingFeesUpfront => inputs.selling_fees_upfront,
            Field::SellingFeesAtSale => inputs.selling_fees_at_sale,
            Field::CashAvailable => inputs.cash_available,
            Field::InterestRatePercent => inputs.interest_rate_percent,
            Field::MortgageTermYears => inputs.mortgage_term_years,
        }
    }

    pub fn set(self, inputs: &mut PrimaryInputs, value: f64) {
        let slot = match self {
            Field::HomeReportValue => &mut inputs.home_report_value,
            Field::BidAmount => &mut inputs.bid_amount,
            Field::BuyingFeesUpfront => &mut inputs.buying_fees_upfront,
            Field::BuyingFeesAtSale => &mut inputs.buying_fees_at_sale,
            Field::ExpectedSaleValue => &mut inputs.expected_sale_value,
            Field::ExistingMortgage => &mut inputs.existing_mortgage,
            Field::SellingFeesUpfront => &mut inputs.selling_fees_upfront,
            Field::SellingFeesAtSale => &mut inputs.selling_fees_at_sale,
            Field::CashAvailable => &mut inputs.cash_available,
            Field::InterestRatePercent => &mut inputs.interest_rate_percent,
            Field::MortgageTermYears => &mut inputs.mortgage_term_years,
        };
        *slot = value;
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "kind", content = "percentage", rename_all = "kebab-case")]
pub enum DepositPolicy {
    /// Deposit is a fixed share of the home report value.
    FixedPercentage(f64),
    /// Deposit absorbs every pound left once the other obligations are met.
    #[default]
    FundsDriven,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub deposit_policy: DepositPolicy,
    pub surcharge_applicable: bool,
    pub tax_bands: TaxBandTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deposit_policy: DepositPolicy::default(),
            surcharge_applicable: false,
            tax_bands: TaxBandTable::scottish_lbtt(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedOutputs {
    pub overbid_amount: f64,
    pub standard_tax: f64,
    pub surcharge_tax: f64,
    pub tax_liability: f64,
    pub cash_used_before_purchase: f64,
    pub equity_from_sale: f64,
    pub total_funds_after_sale: f64,
    pub required_deposit: f64,
    pub mortgage_amount: f64,
    pub monthly_payment: f64,
    pub loan_to_value_percent: f64,
    pub overbid_percent: f64,
    pub remaining_cash: f64,
    pub cash_needed_at_purchase: f64,
    pub cash_shortfall: f64,
    pub bridge_loan_required: f64,
}
