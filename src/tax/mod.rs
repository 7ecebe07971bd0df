//! Tax adapter boundary
//!
//! The projection engine never does bracket arithmetic itself. It hands
//! gross income to a [`TaxAdapter`] and treats the [`TaxResult`] as opaque.
//! Adding a jurisdiction means adding an adapter, not touching the engine.

mod standard;

pub use standard::StandardTaxAdapter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Annual tax owed on one gross income
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxResult {
    pub income_tax: f64,
    /// National insurance, social security and similar payroll levies
    pub social_contribution: f64,
    pub loan_repayment: f64,
    pub total: f64,
}

impl TaxResult {
    pub fn new(income_tax: f64, social_contribution: f64, loan_repayment: f64) -> Self {
        Self {
            income_tax,
            social_contribution,
            loan_repayment,
            total: income_tax + social_contribution + loan_repayment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaxError {
    #[error("unknown tax system '{0}'")]
    UnknownSystem(String),

    #[error("invalid gross income {0}")]
    InvalidIncome(f64),
}

/// Jurisdiction-specific tax computation
pub trait TaxAdapter: Send + Sync {
    /// Identifiers this adapter can compute tax for
    fn supported_systems(&self) -> Vec<String>;

    fn supports(&self, tax_system_id: &str) -> bool {
        self.supported_systems().iter().any(|id| id == tax_system_id)
    }

    /// Tax on `gross_income` in calendar `year`, with `loan_balance` still
    /// owed on any income-contingent student loan
    fn compute_tax(
        &self,
        gross_income: f64,
        tax_system_id: &str,
        year: i32,
        loan_balance: f64,
    ) -> Result<TaxResult, TaxError>;
}
