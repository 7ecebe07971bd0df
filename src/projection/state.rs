//! Cross-year balance tracking for a single scenario run

use serde::{Deserialize, Serialize};

use super::housing::{HousingOutcome, Mortgage};
use crate::config::InitialState;

/// Closing balances after the last projected plan-year.
///
/// All amounts are held in base currency. The engine owns one of these per
/// run and advances it exactly once per plan-year; [`ProjectionState::advance`]
/// is the only way to change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionState {
    /// Last plan-year applied (0 before the first)
    plan_year: u32,

    /// Liquid investment balance
    investment_balance: f64,

    /// Value of all property held, including any owned at the start
    property_value: f64,

    /// Mortgage carried in from the initial state; not amortized
    existing_mortgage: f64,

    /// Mortgage taken out on a purchase made during the plan
    mortgage: Option<Mortgage>,

    /// Whether a planned purchase has completed
    property_purchased: bool,

    student_loan_balance: f64,
}

/// Everything that changes the balances at the end of a plan-year, in base currency
#[derive(Debug, Clone)]
pub struct YearEnd<'a> {
    pub return_rate: f64,
    /// Surplus added to investments, never negative
    pub contribution: f64,
    pub loan_repayment: f64,
    pub housing: &'a HousingOutcome,
}

impl ProjectionState {
    pub fn from_initial(initial: &InitialState) -> Self {
        Self {
            plan_year: 0,
            investment_balance: initial.initial_investments,
            property_value: initial.initial_property_value,
            existing_mortgage: initial.initial_mortgage,
            mortgage: None,
            property_purchased: false,
            student_loan_balance: initial.student_loan_balance,
        }
    }

    pub fn plan_year(&self) -> u32 {
        self.plan_year
    }

    pub fn investment_balance(&self) -> f64 {
        self.investment_balance
    }

    pub fn property_value(&self) -> f64 {
        self.property_value
    }

    /// Mortgage taken out during the plan, if still outstanding
    pub fn mortgage(&self) -> Option<Mortgage> {
        self.mortgage
    }

    pub fn property_purchased(&self) -> bool {
        self.property_purchased
    }

    pub fn student_loan_balance(&self) -> f64 {
        self.student_loan_balance
    }

    pub fn mortgage_balance(&self) -> f64 {
        self.existing_mortgage + self.mortgage.map_or(0.0, |m| m.balance)
    }

    pub fn total_liabilities(&self) -> f64 {
        self.mortgage_balance() + self.student_loan_balance
    }

    pub fn property_equity(&self) -> f64 {
        self.property_value - self.mortgage_balance()
    }

    pub fn net_worth(&self) -> f64 {
        self.investment_balance + self.property_value - self.total_liabilities()
    }

    /// Apply one plan-year's flows
    pub fn advance(&mut self, year_end: YearEnd<'_>) {
        self.plan_year += 1;

        let grown = self.investment_balance * (1.0 + year_end.return_rate);
        self.investment_balance = grown + year_end.contribution.max(0.0);

        self.student_loan_balance = (self.student_loan_balance - year_end.loan_repayment).max(0.0);

        let housing = year_end.housing;
        if housing.acquired_value > 0.0 {
            self.property_purchased = true;
            self.property_value += housing.acquired_value;
        }
        self.mortgage = housing.closing_mortgage;
    }
}
