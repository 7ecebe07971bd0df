//! Housing strategy state machine and mortgage arithmetic

use serde::{Deserialize, Serialize};

use super::profiles::{HousingStrategy, PurchasePlan, RentalTerms};
use super::state::ProjectionState;
use crate::error::{ComputationError, ConfigurationError, PlannerError};

const PAYMENTS_PER_YEAR: u32 = 12;

/// Balances below this are treated as repaid
const PAID_OFF_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HousingStatus {
    Renting,
    /// Renting while saving toward a planned purchase
    PrePurchase,
    PurchaseYear,
    Amortizing,
    /// Property held with no mortgage outstanding
    Owned,
}

/// Fixed-rate repayment mortgage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mortgage {
    pub balance: f64,
    pub annual_rate: f64,
    pub payments_remaining: u32,
}

/// Payments made over one plan-year
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AmortizationYear {
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
}

/// Level monthly payment that repays `principal` over `payments` months
pub fn monthly_payment(principal: f64, annual_rate: f64, payments: u32) -> Result<f64, ComputationError> {
    if payments == 0 {
        return Err(ComputationError::DegenerateMortgage {
            reason: format!("balance {principal:.2} outstanding with no payments remaining"),
        });
    }
    let n = f64::from(payments);
    let r = annual_rate / f64::from(PAYMENTS_PER_YEAR);
    if r == 0.0 {
        return Ok(principal / n);
    }
    let growth = (1.0 + r).powf(n);
    Ok(principal * r * growth / (growth - 1.0))
}

impl Mortgage {
    pub fn new(principal: f64, annual_rate: f64, term_years: u32) -> Result<Self, ComputationError> {
        if term_years == 0 {
            return Err(ComputationError::DegenerateMortgage {
                reason: "mortgage term must be at least one year".to_string(),
            });
        }
        if !annual_rate.is_finite() || annual_rate < 0.0 {
            return Err(ComputationError::DegenerateMortgage {
                reason: format!("invalid mortgage rate {annual_rate}"),
            });
        }
        Ok(Self {
            balance: principal,
            annual_rate,
            payments_remaining: term_years * PAYMENTS_PER_YEAR,
        })
    }

    pub fn is_repaid(&self) -> bool {
        self.balance <= PAID_OFF_EPSILON
    }

    /// Make up to twelve monthly payments, recomputing the level payment
    /// from the outstanding balance and remaining count each month
    pub fn amortize_year(&mut self) -> Result<AmortizationYear, ComputationError> {
        let mut year = AmortizationYear::default();
        let monthly_rate = self.annual_rate / f64::from(PAYMENTS_PER_YEAR);

        for _ in 0..PAYMENTS_PER_YEAR {
            if self.is_repaid() {
                self.balance = 0.0;
                break;
            }
            let payment = monthly_payment(self.balance, self.annual_rate, self.payments_remaining)?;
            let interest = self.balance * monthly_rate;
            let principal = (payment - interest).min(self.balance);

            self.balance -= principal;
            self.payments_remaining -= 1;

            year.payment += interest + principal;
            year.interest += interest;
            year.principal += principal;
        }
        Ok(year)
    }
}

/// What one plan-year of housing costs and does to the balance sheet.
/// Cash amounts are in the phase currency; `closing_mortgage` and
/// `acquired_value` are in base currency.
#[derive(Debug, Clone, PartialEq)]
pub struct HousingOutcome {
    pub status: HousingStatus,
    pub rent: f64,
    /// Deposit plus purchase fees, paid in the purchase year
    pub purchase_outlay: f64,
    pub mortgage: AmortizationYear,
    pub closing_mortgage: Option<Mortgage>,
    pub acquired_value: f64,
}

impl HousingOutcome {
    /// Cash paid for housing this year
    pub fn cost(&self) -> f64 {
        self.rent + self.purchase_outlay + self.mortgage.payment
    }
}

/// Run one plan-year of the active phase's housing strategy.
///
/// A mortgage already on the books keeps amortizing whatever the strategy,
/// so a later rent strategy pays rent on top of the mortgage.
pub fn step(
    strategy: &HousingStrategy,
    plan_year: u32,
    state: &ProjectionState,
    exchange_rate: f64,
) -> Result<HousingOutcome, PlannerError> {
    let mut closing = state.mortgage();
    let mut mortgage_year = AmortizationYear::default();
    if let Some(mortgage) = closing.as_mut() {
        let paid = mortgage.amortize_year()?;
        mortgage_year = AmortizationYear {
            payment: paid.payment * exchange_rate,
            interest: paid.interest * exchange_rate,
            principal: paid.principal * exchange_rate,
        };
        if mortgage.is_repaid() {
            closing = None;
        }
    }
    let holding_status = if state.mortgage().is_some() {
        HousingStatus::Amortizing
    } else {
        HousingStatus::Owned
    };

    let mut outcome = HousingOutcome {
        status: HousingStatus::Renting,
        rent: 0.0,
        purchase_outlay: 0.0,
        mortgage: mortgage_year,
        closing_mortgage: closing,
        acquired_value: 0.0,
    };

    match strategy {
        HousingStrategy::Rent { rental } => {
            outcome.rent = rental.annual_cost();
            if state.property_purchased() {
                outcome.status = holding_status;
            }
        }
        HousingStrategy::Buy { .. } if state.property_purchased() => {
            outcome.status = holding_status;
        }
        HousingStrategy::Buy { rental, purchase } => {
            if plan_year == purchase.target_year {
                buy(purchase, exchange_rate, &mut outcome)?;
            } else {
                outcome.status = if plan_year < purchase.target_year {
                    HousingStatus::PrePurchase
                } else {
                    // target passed before this strategy took effect
                    HousingStatus::Renting
                };
                outcome.rent = required_rental(rental.as_ref())?.annual_cost();
            }
        }
    }
    Ok(outcome)
}

fn buy(purchase: &PurchasePlan, exchange_rate: f64, outcome: &mut HousingOutcome) -> Result<(), ComputationError> {
    outcome.status = HousingStatus::PurchaseYear;
    outcome.purchase_outlay = purchase.deposit() + purchase.fees();
    outcome.acquired_value = purchase.property_price / exchange_rate;

    let loan = purchase.loan_amount() / exchange_rate;
    let mortgage = Mortgage::new(loan, purchase.mortgage_rate, purchase.mortgage_term_years)?;
    if !mortgage.is_repaid() {
        outcome.closing_mortgage = Some(mortgage);
    }
    log::debug!(
        "Property purchase: price {:.0}, outlay {:.0}, mortgage {:.0}",
        purchase.property_price,
        outcome.purchase_outlay,
        purchase.loan_amount()
    );
    Ok(())
}

fn required_rental(rental: Option<&RentalTerms>) -> Result<&RentalTerms, ConfigurationError> {
    rental.ok_or_else(|| ConfigurationError::missing("buy housing strategy while renting", "rental"))
}
