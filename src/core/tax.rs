use serde::Serialize;
use thiserror::Error;

/// Additional Dwelling Supplement, levied on the full price.
pub const SURCHARGE_RATE: f64 = 0.06;

#[derive(Debug, Error, PartialEq)]
pub enum TaxTableError {
    #[error("tax band table must contain at least one band")]
    Empty,
    #[error("band {index} threshold must be greater than the previous threshold")]
    NonAscending { index: usize },
    #[error("band {index} rate must be between 0 and 1")]
    InvalidRate { index: usize },
    #[error("final band must be unbounded")]
    BoundedTail,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBand {
    /// Inclusive upper edge of the band; `f64::INFINITY` for the top band.
    pub upper_threshold: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxBandTable {
    bands: Vec<TaxBand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub standard: f64,
    pub surcharge: f64,
    pub total: f64,
}

impl TaxBandTable {
    pub fn new(bands: Vec<TaxBand>) -> Result<Self, TaxTableError> {
        if bands.is_empty() {
            return Err(TaxTableError::Empty);
        }
        let mut previous = 0.0;
        for (index, band) in bands.iter().enumerate() {
            if band.upper_threshold.is_nan() || band.upper_threshold <= previous {
                return Err(TaxTableError::NonAscending { index });
            }
            if !(0.0..=1.0).contains(&band.rate) {
                return Err(TaxTableError::InvalidRate { index });
            }
            previous = band.upper_threshold;
        }
        if previous != f64::INFINITY {
            return Err(TaxTableError::BoundedTail);
        }
        Ok(Self { bands })
    }

    /// Current Scottish LBTT residential rates.
    pub fn scottish_lbtt() -> Self {
        Self {
            bands: vec![
                TaxBand {
                    upper_threshold: 145_000.0,
                    rate: 0.0,
                },
                TaxBand {
                    upper_threshold: 250_000.0,
                    rate: 0.02,
                },
                TaxBand {
                    upper_threshold: 325_000.0,
                    rate: 0.05,
                },
                TaxBand {
                    upper_threshold: 750_000.0,
                    rate: 0.10,
                },
                TaxBand {
                    upper_threshold: f64::INFINITY,
                    rate: 0.12,
                },
            ],
        }
    }

    pub fn bands(&self) -> &[TaxBand] {
        &self.bands
    }

    /// Progressive tax: each slice of the price is charged at its own band's rate.
    pub fn banded_tax(&self, price: f64) -> f64 {
        let mut remaining = price;
        let mut previous_threshold = 0.0;
        let mut tax = 0.0;

        for band in &self.bands {
            if remaining <= 0.0 {
                break;
            }
            let slice = remaining.min(band.upper_threshold - previous_threshold);
            tax += slice * band.rate;
            remaining -= slice;
            previous_threshold = band.upper_threshold;
        }

        tax
    }

    pub fn breakdown(&self, price: f64, surcharge_applicable: bool) -> TaxBreakdown {
        let price = if price.is_finite() { price.max(0.0) } else { 0.0 };
        let standard = self.banded_tax(price);
        let surcharge = if surcharge_applicable {
            price * SURCHARGE_RATE
        } else {
            0.0
        };
        TaxBreakdown {
            standard,
            surcharge,
            total: standard + surcharge,
        }
    }
}

impl Default for TaxBandTable {
    fn default() -> Self {
        Self::scottish_lbtt()
    }
}

pub fn compute_tax(price: f64, surcharge_applicable: bool) -> f64 {
    TaxBandTable::scottish_lbtt()
        .breakdown(price, surcharge_applicable)
        .total
}
