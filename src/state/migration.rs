//! Schema generations of the persisted input blob and the steps between them.
//!
//! Generation 1 is the original calculator: solicitor-named fee fields, a
//! fixed deposit percentage and an ADS toggle. Generation 2 renamed the fee
//! fields and dropped the deposit and ADS inputs in favour of the
//! funds-driven deposit. Generation 3 split the single selling fee into an
//! upfront part and a part paid out of the sale proceeds.

use serde_json::{Map, Value};

use crate::core::{Field, PrimaryInputs, clamp_non_negative};

pub const VERSION_KEY: &str = "schemaVersion";

/// Assumed upfront selling fee for records saved before the fee split.
pub const HISTORICAL_SELLING_FEES_UPFRONT: f64 = 500.0;

const V1_MARKERS: [&str; 7] = [
    "depositPercentage",
    "adsApplicable",
    "buyingSolicitorFeesUpfront",
    "buyingSolicitorFeesAtSale",
    "sellingSolicitorFees",
    "interestRate",
    "mortgageTerm",
];

const V1_RENAMES: [(&str, &str); 5] = [
    ("buyingSolicitorFeesUpfront", "buyingFeesUpfront"),
    ("buyingSolicitorFeesAtSale", "buyingFeesAtSale"),
    ("sellingSolicitorFees", "sellingFees"),
    ("interestRate", "interestRatePercent"),
    ("mortgageTerm", "mortgageTermYears"),
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum SchemaVersion {
    V1 = 1,
    V2 = 2,
    V3 = 3,
}

impl SchemaVersion {
    pub const CURRENT: SchemaVersion = SchemaVersion::V3;

    fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            1 => Some(SchemaVersion::V1),
            2 => Some(SchemaVersion::V2),
            3 => Some(SchemaVersion::V3),
            _ => None,
        }
    }

    /// Uses the explicit tag when present, otherwise classifies an untagged
    /// blob by the fields only older generations carry.
    pub fn detect(record: &Map<String, Value>) -> Self {
        if let Some(version) = record
            .get(VERSION_KEY)
            .and_then(Value::as_u64)
            .and_then(Self::from_tag)
        {
            return version;
        }
        if V1_MARKERS.iter().any(|key| record.contains_key(*key)) {
            SchemaVersion::V1
        } else if record.contains_key("sellingFees") {
            SchemaVersion::V2
        } else {
            SchemaVersion::V3
        }
    }
}

type MigrationStep = fn(Map<String, Value>) -> Map<String, Value>;

/// Ordered steps; entry `i` upgrades a record from `from` to the next version.
const MIGRATIONS: [(SchemaVersion, MigrationStep); 2] = [
    (SchemaVersion::V1, v1_to_v2),
    (SchemaVersion::V2, v2_to_v3),
];

fn v1_to_v2(mut record: Map<String, Value>) -> Map<String, Value> {
    for (old, new) in V1_RENAMES {
        if let Some(value) = record.remove(old) {
            record.entry(new).or_insert(value);
        }
    }
    record.remove("depositPercentage");
    record.remove("adsApplicable");
    record.insert(VERSION_KEY.to_string(), Value::from(2));
    record
}

fn v2_to_v3(mut record: Map<String, Value>) -> Map<String, Value> {
    if let Some(fees) = record.remove("sellingFees") {
        record
            .entry(Field::SellingFeesAtSale.name())
            .or_insert(fees);
        record
            .entry(Field::SellingFeesUpfront.name())
            .or_insert(Value::from(HISTORICAL_SELLING_FEES_UPFRONT));
    }
    record.insert(VERSION_KEY.to_string(), Value::from(3));
    record
}

/// Applies every step from the record's detected version up to the current one.
pub fn migrate(record: Map<String, Value>) -> (SchemaVersion, Map<String, Value>) {
    let detected = SchemaVersion::detect(&record);
    let migrated = MIGRATIONS
        .iter()
        .filter(|(from, _)| *from >= detected)
        .fold(record, |acc, (_, step)| step(acc));
    (detected, migrated)
}

/// Builds a current-generation record, taking `defaults` for any field that
/// is missing or not numeric.
pub fn record_from_map(record: &Map<String, Value>, defaults: &PrimaryInputs) -> PrimaryInputs {
    let mut inputs = *defaults;
    for field in Field::ALL {
        if let Some(value) = record.get(field.name()).and_then(numeric_value) {
            field.set(&mut inputs, clamp_non_negative(value));
        }
    }
    inputs
}

pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Decimal text to a finite number; `NaN` and infinities count as unparsable.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn detect_prefers_explicit_tag() {
        let record = object(json!({ "schemaVersion": 2, "depositPercentage": 20 }));
        assert_eq!(SchemaVersion::detect(&record), SchemaVersion::V2);
    }

    #[test]
    fn detect_classifies_untagged_records_by_fields() {
        assert_eq!(
            SchemaVersion::detect(&object(json!({ "adsApplicable": true }))),
            SchemaVersion::V1
        );
        assert_eq!(
            SchemaVersion::detect(&object(json!({ "sellingFees": 1500 }))),
            SchemaVersion::V2
        );
        assert_eq!(
            SchemaVersion::detect(&object(json!({ "sellingFeesAtSale": 1500 }))),
            SchemaVersion::V3
        );
        assert_eq!(
            SchemaVersion::detect(&object(json!({ "schemaVersion": 99, "sellingFees": 1 }))),
            SchemaVersion::V2
        );
    }

    #[test]
    fn v2_record_splits_selling_fees() {
        let (from, migrated) = migrate(object(json!({ "sellingFees": 2000 })));
        assert_eq!(from, SchemaVersion::V2);
        assert_eq!(migrated.get("sellingFeesAtSale"), Some(&json!(2000)));
        assert_eq!(migrated.get("sellingFeesUpfront"), Some(&json!(500.0)));
        assert!(!migrated.contains_key("sellingFees"));
        assert_eq!(migrated.get(VERSION_KEY), Some(&json!(3)));
    }

    #[test]
    fn v1_record_is_renamed_then_split_and_drops_removed_inputs() {
        let (from, migrated) = migrate(object(json!({
            "homeReportValue": 300000,
            "buyingSolicitorFeesUpfront": 700,
            "buyingSolicitorFeesAtSale": 1800,
            "sellingSolicitorFees": 1600,
            "interestRate": 3.75,
            "mortgageTerm": 30,
            "depositPercentage": 15,
            "adsApplicable": true
        })));
        assert_eq!(from, SchemaVersion::V1);

        let inputs = record_from_map(&migrated, &PrimaryInputs::default());
        assert_eq!(inputs.home_report_value, 300_000.0);
        assert_eq!(inputs.buying_fees_upfront, 700.0);
        assert_eq!(inputs.buying_fees_at_sale, 1_800.0);
        assert_eq!(inputs.selling_fees_at_sale, 1_600.0);
        assert_eq!(inputs.selling_fees_upfront, HISTORICAL_SELLING_FEES_UPFRONT);
        assert_eq!(inputs.interest_rate_percent, 3.75);
        assert_eq!(inputs.mortgage_term_years, 30.0);
        assert!(!migrated.contains_key("depositPercentage"));
        assert!(!migrated.contains_key("adsApplicable"));
    }

    #[test]
    fn current_record_passes_through_unchanged_fields() {
        let record = object(json!({ "sellingFeesUpfront": 0, "sellingFeesAtSale": 900 }));
        let (from, migrated) = migrate(record);
        assert_eq!(from, SchemaVersion::V3);
        assert_eq!(migrated.get("sellingFeesUpfront"), Some(&json!(0)));
        assert_eq!(migrated.get("sellingFeesAtSale"), Some(&json!(900)));
    }

    #[test]
    fn record_from_map_coerces_bad_values() {
        let record = object(json!({
            "bidAmount": "270000",
            "cashAvailable": "lots",
            "existingMortgage": -10,
            "interestRatePercent": null,
            "mortgageTermYears": [25]
        }));
        let defaults = PrimaryInputs::default();
        let inputs = record_from_map(&record, &defaults);
        assert_eq!(inputs.bid_amount, 270_000.0);
        assert_eq!(inputs.cash_available, defaults.cash_available);
        assert_eq!(inputs.existing_mortgage, 0.0);
        assert_eq!(inputs.interest_rate_percent, defaults.interest_rate_percent);
        assert_eq!(inputs.mortgage_term_years, defaults.mortgage_term_years);
    }

    #[test]
    fn record_from_map_treats_non_finite_text_as_unparsable() {
        let record = object(json!({
            "homeReportValue": "NaN",
            "bidAmount": "inf",
            "cashAvailable": "-infinity"
        }));
        let defaults = PrimaryInputs::default();
        let inputs = record_from_map(&record, &defaults);
        assert_eq!(inputs.home_report_value, defaults.home_report_value);
        assert_eq!(inputs.bid_amount, defaults.bid_amount);
        assert_eq!(inputs.cash_available, defaults.cash_available);
    }
}
