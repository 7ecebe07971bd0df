//! Projection output records

use serde::{Deserialize, Serialize};

use super::housing::HousingStatus;
use crate::config::{Currency, Jurisdiction};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeBreakdown {
    pub salary: f64,
    pub bonus: f64,
    pub equity: f64,
    /// Windfalls and other untaxed receipts
    pub other: f64,
    pub total: f64,
}

impl IncomeBreakdown {
    pub fn new(salary: f64, bonus: f64, equity: f64, other: f64) -> Self {
        Self {
            salary,
            bonus,
            equity,
            other,
            total: salary + bonus + equity + other,
        }
    }

    /// Income the tax adapter is asked about
    pub fn employment(&self) -> f64 {
        self.salary + self.bonus + self.equity
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseBreakdown {
    pub living: f64,
    pub housing: f64,
    /// One-off life-event spending
    pub other: f64,
    pub total: f64,
}

impl ExpenseBreakdown {
    pub fn new(living: f64, housing: f64, other: f64) -> Self {
        Self {
            living,
            housing,
            other,
            total: living + housing + other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub income_tax: f64,
    pub social_contribution: f64,
    pub loan_repayment: f64,
    /// Whatever the adapter's total holds beyond the named components
    pub other: f64,
    pub total: f64,
}

impl TaxBreakdown {
    pub fn from_result(result: &crate::tax::TaxResult) -> Self {
        let named = result.income_tax + result.social_contribution + result.loan_repayment;
        Self {
            income_tax: result.income_tax,
            social_contribution: result.social_contribution,
            loan_repayment: result.loan_repayment,
            other: result.total - named,
            total: result.total,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestmentBreakdown {
    pub retirement: f64,
    pub taxable: f64,
    pub total: f64,
}

impl InvestmentBreakdown {
    pub fn new(retirement: f64, taxable: f64) -> Self {
        Self {
            retirement,
            taxable,
            total: retirement + taxable,
        }
    }
}

/// `total = liquid_assets + illiquid_assets - liabilities`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetWorthBreakdown {
    pub liquid_assets: f64,
    pub illiquid_assets: f64,
    pub liabilities: f64,
    pub total: f64,
}

impl NetWorthBreakdown {
    pub fn new(liquid_assets: f64, illiquid_assets: f64, liabilities: f64) -> Self {
        Self {
            liquid_assets,
            illiquid_assets,
            liabilities,
            total: liquid_assets + illiquid_assets - liabilities,
        }
    }
}

/// One projected plan-year. Amounts are in `currency`; `exchange_rate` is
/// units of `currency` per unit of base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyDataPoint {
    pub plan_year: u32,
    pub year: i32,
    pub age: u32,
    pub phase: String,
    pub jurisdiction: Jurisdiction,
    pub currency: Currency,
    pub exchange_rate: f64,
    pub housing_status: HousingStatus,
    pub income: IncomeBreakdown,
    pub expenses: ExpenseBreakdown,
    pub tax: TaxBreakdown,
    pub investments: InvestmentBreakdown,
    /// Closing balances
    pub net_worth: NetWorthBreakdown,
}

impl YearlyDataPoint {
    pub fn net_income(&self) -> f64 {
        self.income.total - self.tax.total
    }

    /// Income left after tax and expenses; negative in a shortfall year
    pub fn annual_savings(&self) -> f64 {
        self.net_income() - self.expenses.total
    }

    /// Convert an amount in this point's currency to base currency
    pub fn to_base(&self, amount: f64) -> f64 {
        amount / self.exchange_rate
    }
}

/// Scenario-level aggregates, in base currency
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub years: u32,
    pub final_net_worth: f64,
    pub total_tax: f64,
    pub average_annual_savings: f64,
    /// Percent change from the first to the last closing net worth
    pub net_worth_growth_rate: f64,
    pub final_liquid_assets: f64,
}

/// Ordered projection for one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioProjection {
    pub scenario_name: String,
    pub base_currency: Currency,
    pub data_points: Vec<YearlyDataPoint>,
}

impl ScenarioProjection {
    pub fn new(scenario_name: impl Into<String>, base_currency: Currency) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            base_currency,
            data_points: Vec::new(),
        }
    }

    pub fn add_point(&mut self, point: YearlyDataPoint) {
        self.data_points.push(point);
    }

    pub fn summary(&self) -> ScenarioSummary {
        let Some(last) = self.data_points.last() else {
            return ScenarioSummary::default();
        };
        let net_worth = |point: &YearlyDataPoint| point.to_base(point.net_worth.total);

        let years = self.data_points.len() as u32;
        let total_tax: f64 = self.data_points.iter().map(|p| p.to_base(p.tax.total)).sum();
        let total_savings: f64 = self
            .data_points
            .iter()
            .map(|p| p.to_base(p.annual_savings()))
            .sum();

        let final_net_worth = net_worth(last);
        let initial_net_worth = net_worth(&self.data_points[0]);
        let net_worth_growth_rate = if self.data_points.len() < 2 || initial_net_worth == 0.0 {
            0.0
        } else {
            (final_net_worth - initial_net_worth) / initial_net_worth * 100.0
        };

        ScenarioSummary {
            years,
            final_net_worth,
            total_tax,
            average_annual_savings: total_savings / f64::from(years),
            net_worth_growth_rate,
            final_liquid_assets: last.to_base(last.net_worth.liquid_assets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn point(plan_year: u32, currency: Currency, rate: f64, net_worth: f64) -> YearlyDataPoint {
        YearlyDataPoint {
            plan_year,
            year: 2024 + plan_year as i32,
            age: 24 + plan_year,
            phase: "main_phase".to_string(),
            jurisdiction: Jurisdiction::UK,
            currency,
            exchange_rate: rate,
            housing_status: HousingStatus::Renting,
            income: IncomeBreakdown::new(50_000.0 * rate, 0.0, 0.0, 0.0),
            expenses: ExpenseBreakdown::new(20_000.0 * rate, 10_000.0 * rate, 0.0),
            tax: TaxBreakdown::from_result(&crate::tax::TaxResult::new(8_000.0 * rate, 2_000.0 * rate, 0.0)),
            investments: InvestmentBreakdown::default(),
            net_worth: NetWorthBreakdown::new(net_worth * rate, 0.0, 0.0),
        }
    }

    #[test]
    fn test_breakdown_totals() {
        let income = IncomeBreakdown::new(1.0, 2.0, 3.0, 4.0);
        assert_relative_eq!(income.total, 10.0);
        assert_relative_eq!(income.employment(), 6.0);
        assert_relative_eq!(NetWorthBreakdown::new(10.0, 5.0, 3.0).total, 12.0);
    }

    #[test]
    fn test_tax_other_captures_unnamed_total() {
        let result = crate::tax::TaxResult {
            income_tax: 100.0,
            social_contribution: 50.0,
            loan_repayment: 0.0,
            total: 175.0,
        };
        assert_relative_eq!(TaxBreakdown::from_result(&result).other, 25.0);
    }

    #[test]
    fn test_summary_in_base_currency() {
        let mut projection = ScenarioProjection::new("test", Currency::GBP);
        projection.add_point(point(1, Currency::GBP, 1.0, 10_000.0));
        projection.add_point(point(2, Currency::USD, 1.26, 25_000.0));

        let summary = projection.summary();
        assert_eq!(summary.years, 2);
        assert_relative_eq!(summary.final_net_worth, 25_000.0, epsilon = 1e-9);
        assert_relative_eq!(summary.total_tax, 20_000.0, epsilon = 1e-9);
        assert_relative_eq!(summary.average_annual_savings, 10_000.0, epsilon = 1e-9);
        assert_relative_eq!(summary.net_worth_growth_rate, 150.0, epsilon = 1e-9);
        assert_relative_eq!(summary.final_liquid_assets, 25_000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_summary_edge_cases() {
        let empty = ScenarioProjection::new("empty", Currency::GBP);
        assert_eq!(empty.summary(), ScenarioSummary::default());

        let mut single = ScenarioProjection::new("single", Currency::GBP);
        single.add_point(point(1, Currency::GBP, 1.0, 10_000.0));
        assert_relative_eq!(single.summary().net_worth_growth_rate, 0.0);

        let mut from_zero = ScenarioProjection::new("zero", Currency::GBP);
        from_zero.add_point(point(1, Currency::GBP, 1.0, 0.0));
        from_zero.add_point(point(2, Currency::GBP, 1.0, 5_000.0));
        assert_relative_eq!(from_zero.summary().net_worth_growth_rate, 0.0);
    }
}
