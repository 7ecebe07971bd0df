//! Simplified UK, US federal and tax-free systems at 2025/26 rates

use super::{TaxAdapter, TaxError, TaxResult};
use crate::config::{TAX_FREE_SYSTEM, UK_TAX_SYSTEM, US_TAX_SYSTEM};

/// Upper bound of a band of taxable income and the rate applied inside it
#[derive(Debug, Clone, Copy)]
struct Band {
    upper: f64,
    rate: f64,
}

const UK_PERSONAL_ALLOWANCE: f64 = 12_570.0;
const UK_ALLOWANCE_TAPER_START: f64 = 100_000.0;

/// Bands over taxable income (after the personal allowance)
const UK_INCOME_BANDS: [Band; 3] = [
    Band { upper: 37_700.0, rate: 0.20 },
    Band { upper: 125_140.0, rate: 0.40 },
    Band { upper: f64::INFINITY, rate: 0.45 },
];

const UK_NI_PRIMARY_THRESHOLD: f64 = 12_570.0;
const UK_NI_UPPER_EARNINGS_LIMIT: f64 = 50_270.0;
const UK_NI_MAIN_RATE: f64 = 0.08;
const UK_NI_UPPER_RATE: f64 = 0.02;

const US_STANDARD_DEDUCTION: f64 = 15_000.0;

/// 2025 single-filer brackets over taxable income
const US_INCOME_BANDS: [Band; 7] = [
    Band { upper: 11_925.0, rate: 0.10 },
    Band { upper: 48_475.0, rate: 0.12 },
    Band { upper: 103_350.0, rate: 0.22 },
    Band { upper: 197_300.0, rate: 0.24 },
    Band { upper: 250_525.0, rate: 0.32 },
    Band { upper: 626_350.0, rate: 0.35 },
    Band { upper: f64::INFINITY, rate: 0.37 },
];

const US_SOCIAL_SECURITY_RATE: f64 = 0.062;
const US_SOCIAL_SECURITY_WAGE_BASE: f64 = 176_100.0;
const US_MEDICARE_RATE: f64 = 0.0145;
const US_ADDITIONAL_MEDICARE_RATE: f64 = 0.009;
const US_ADDITIONAL_MEDICARE_THRESHOLD: f64 = 200_000.0;

const STUDENT_LOAN_THRESHOLD: f64 = 27_295.0;
const STUDENT_LOAN_RATE: f64 = 0.09;

/// Built-in adapter covering the tax systems shipped in `tax_systems/`
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTaxAdapter;

impl StandardTaxAdapter {
    pub fn new() -> Self {
        Self
    }

    fn uk(gross: f64) -> (f64, f64) {
        let taper = ((gross - UK_ALLOWANCE_TAPER_START).max(0.0) / 2.0).min(UK_PERSONAL_ALLOWANCE);
        let allowance = UK_PERSONAL_ALLOWANCE - taper;
        let income_tax = banded(gross - allowance, &UK_INCOME_BANDS);

        let main = (gross.min(UK_NI_UPPER_EARNINGS_LIMIT) - UK_NI_PRIMARY_THRESHOLD).max(0.0);
        let upper = (gross - UK_NI_UPPER_EARNINGS_LIMIT).max(0.0);
        let ni = main * UK_NI_MAIN_RATE + upper * UK_NI_UPPER_RATE;

        (income_tax, ni)
    }

    fn us(gross: f64) -> (f64, f64) {
        let income_tax = banded(gross - US_STANDARD_DEDUCTION, &US_INCOME_BANDS);

        let social_security = gross.min(US_SOCIAL_SECURITY_WAGE_BASE) * US_SOCIAL_SECURITY_RATE;
        let medicare = gross * US_MEDICARE_RATE
            + (gross - US_ADDITIONAL_MEDICARE_THRESHOLD).max(0.0) * US_ADDITIONAL_MEDICARE_RATE;

        (income_tax, social_security + medicare)
    }

    fn student_loan(gross: f64, balance: f64) -> f64 {
        if balance <= 0.0 {
            return 0.0;
        }
        ((gross - STUDENT_LOAN_THRESHOLD).max(0.0) * STUDENT_LOAN_RATE).min(balance)
    }
}

/// Tax on `taxable` across consecutive bands starting at zero
fn banded(taxable: f64, bands: &[Band]) -> f64 {
    let mut tax = 0.0;
    let mut lower = 0.0;
    for band in bands {
        if taxable <= lower {
            break;
        }
        tax += (taxable.min(band.upper) - lower) * band.rate;
        lower = band.upper;
    }
    tax
}

impl TaxAdapter for StandardTaxAdapter {
    fn supported_systems(&self) -> Vec<String> {
        [UK_TAX_SYSTEM, US_TAX_SYSTEM, TAX_FREE_SYSTEM]
            .iter()
            .map(|id| id.to_string())
            .collect()
    }

    fn compute_tax(
        &self,
        gross_income: f64,
        tax_system_id: &str,
        year: i32,
        loan_balance: f64,
    ) -> Result<TaxResult, TaxError> {
        if !gross_income.is_finite() || gross_income < 0.0 {
            return Err(TaxError::InvalidIncome(gross_income));
        }

        let (income_tax, social) = match tax_system_id {
            UK_TAX_SYSTEM => Self::uk(gross_income),
            US_TAX_SYSTEM => Self::us(gross_income),
            TAX_FREE_SYSTEM => (0.0, 0.0),
            other => return Err(TaxError::UnknownSystem(other.to_string())),
        };
        let loan = Self::student_loan(gross_income, loan_balance);

        log::trace!("{tax_system_id} {year}: gross {gross_income:.0} -> tax {income_tax:.0}, social {social:.0}, loan {loan:.0}");
        Ok(TaxResult::new(income_tax, social, loan))
    }
}
