//! Year-by-year projection over a resolved scenario

use std::collections::BTreeMap;
use std::sync::Arc;

use super::housing;
use super::profiles::{LifeEvent, PhaseProfiles};
use super::records::{
    ExpenseBreakdown, IncomeBreakdown, InvestmentBreakdown, NetWorthBreakdown, ScenarioProjection,
    TaxBreakdown, YearlyDataPoint,
};
use super::state::{ProjectionState, YearEnd};
use crate::config::{Currency, PhaseConfig, PlanningHorizon, PlanningParams, ResolvedScenarioConfig};
use crate::error::{ComputationError, ConfigurationError, PlannerError};
use crate::tax::TaxAdapter;

/// Engine tunables
#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    /// Annual return on the investment balance
    pub investment_return_rate: f64,

    /// Currency balances are held and aggregated in
    pub base_currency: Currency,

    /// Units of each currency per unit of base currency
    pub exchange_rates: BTreeMap<Currency, f64>,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            investment_return_rate: 0.065,
            base_currency: Currency::GBP,
            exchange_rates: BTreeMap::from([(Currency::GBP, 1.0), (Currency::USD, 1.26)]),
        }
    }
}

impl ProjectionConfig {
    /// This config with a scenario's planning overrides applied
    pub fn with_planning(&self, planning: &PlanningParams) -> Self {
        let mut config = self.clone();
        if let Some(rate) = planning.investment_return_rate {
            config.investment_return_rate = rate;
        }
        config
            .exchange_rates
            .extend(planning.exchange_rates.iter().map(|(currency, rate)| (*currency, *rate)));
        config.exchange_rates.insert(config.base_currency, 1.0);
        config
    }

    pub fn exchange_rate(&self, currency: Currency) -> Result<f64, ConfigurationError> {
        match self.exchange_rates.get(&currency) {
            Some(rate) if rate.is_finite() && *rate > 0.0 => Ok(*rate),
            Some(rate) => Err(ConfigurationError::invalid(
                "exchange_rates",
                currency.to_string(),
                format!("rate must be positive, found {rate}"),
            )),
            None => Err(ConfigurationError::missing("exchange_rates", currency.to_string())),
        }
    }
}

/// The per-run inputs shared by every plan-year
struct RunContext<'a> {
    horizon: PlanningHorizon,
    config: ProjectionConfig,
    events: &'a [LifeEvent],
}

/// Simulates a resolved scenario, one plan-year at a time
pub struct ProjectionEngine {
    tax: Arc<dyn TaxAdapter>,
    config: ProjectionConfig,
}

impl ProjectionEngine {
    pub fn new(tax: Arc<dyn TaxAdapter>, config: ProjectionConfig) -> Self {
        Self { tax, config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    pub fn tax_adapter(&self) -> Arc<dyn TaxAdapter> {
        Arc::clone(&self.tax)
    }

    /// Project every plan-year of `scenario`.
    ///
    /// The run is forward-only: a failure in any year aborts the whole
    /// projection and nothing partial is returned.
    pub fn project(&self, scenario: &ResolvedScenarioConfig) -> Result<ScenarioProjection, PlannerError> {
        let horizon = scenario.planning.horizon()?;
        let profiles = scenario
            .phases
            .iter()
            .map(PhaseProfiles::from_phase)
            .collect::<Result<Vec<_>, _>>()?;
        let events = scenario
            .life_events
            .iter()
            .map(LifeEvent::from_document)
            .collect::<Result<Vec<_>, _>>()?;

        let run = RunContext {
            horizon,
            config: self.config.with_planning(&scenario.planning),
            events: &events,
        };

        let mut state = ProjectionState::from_initial(&scenario.planning.initial_state);
        let mut projection = ScenarioProjection::new(scenario.name(), run.config.base_currency);
        let mut active_phase: Option<usize> = None;

        for plan_year in 1..=horizon.duration_years {
            let index = scenario
                .phases
                .iter()
                .position(|phase| phase.covers(plan_year))
                .ok_or(ComputationError::NoPhaseForYear { plan_year })?;
            let phase = &scenario.phases[index];
            if active_phase != Some(index) {
                log::debug!("Plan-year {plan_year}: entering phase '{}' ({})", phase.name, phase.location_market);
                active_phase = Some(index);
            }

            let point = self.project_year(plan_year, phase, &profiles[index], &run, &mut state)?;
            projection.add_point(point);
        }

        log::info!(
            "Projected scenario '{}' over {} years",
            projection.scenario_name,
            projection.data_points.len()
        );
        Ok(projection)
    }

    fn project_year(
        &self,
        plan_year: u32,
        phase: &PhaseConfig,
        profiles: &PhaseProfiles,
        run: &RunContext<'_>,
        state: &mut ProjectionState,
    ) -> Result<YearlyDataPoint, PlannerError> {
        let calendar_year = run.horizon.start_year + plan_year as i32 - 1;
        let currency = phase.currency();
        let rate = run.config.exchange_rate(currency)?;

        // Income
        let pay = profiles.salary.compensation(plan_year);
        let windfalls = event_total(run.events, plan_year, |event| match event {
            LifeEvent::Windfall { amount, .. } => Some(*amount),
            _ => None,
        });
        let income = IncomeBreakdown::new(pay.salary, pay.bonus, pay.equity, windfalls);

        // Tax
        let tax_result = self
            .tax
            .compute_tax(
                income.employment(),
                &profiles.tax_system_id,
                calendar_year,
                state.student_loan_balance() * rate,
            )
            .map_err(|source| ComputationError::Tax {
                tax_system_id: profiles.tax_system_id.clone(),
                year: calendar_year,
                source,
            })?;
        let tax = TaxBreakdown::from_result(&tax_result);
        let net_income = income.total - tax.total;

        // Expenses and housing
        let living = profiles.expenses.annual_total(plan_year, net_income);
        let housing = housing::step(&profiles.housing, plan_year, state, rate)?;
        let one_offs = event_total(run.events, plan_year, |event| match event {
            LifeEvent::OneOffExpense { amount, .. } => Some(*amount),
            _ => None,
        });
        let expenses = ExpenseBreakdown::new(living, housing.cost(), one_offs);

        // Investments
        let split = profiles
            .investments
            .as_ref()
            .map(|strategy| strategy.contributions(plan_year, net_income))
            .unwrap_or_default();
        let investments = InvestmentBreakdown::new(split.retirement, split.taxable);

        // A shortfall is never funded from investments
        let surplus = net_income - expenses.total;
        let contribution = surplus.max(0.0);

        for (quantity, value) in [("net income", net_income), ("expenses", expenses.total), ("surplus", surplus)] {
            if !value.is_finite() {
                return Err(ComputationError::NonFinite { quantity, plan_year }.into());
            }
        }

        state.advance(YearEnd {
            return_rate: run.config.investment_return_rate,
            contribution: contribution / rate,
            loan_repayment: tax.loan_repayment / rate,
            housing: &housing,
        });
        if !state.investment_balance().is_finite() {
            return Err(ComputationError::NonFinite {
                quantity: "investment balance",
                plan_year,
            }
            .into());
        }

        Ok(YearlyDataPoint {
            plan_year,
            year: calendar_year,
            age: run.horizon.start_age + plan_year - 1,
            phase: phase.name.clone(),
            jurisdiction: phase.jurisdiction(),
            currency,
            exchange_rate: rate,
            housing_status: housing.status,
            income,
            expenses,
            tax,
            investments,
            net_worth: NetWorthBreakdown::new(
                state.investment_balance() * rate,
                state.property_value() * rate,
                state.total_liabilities() * rate,
            ),
        })
    }
}

fn event_total(events: &[LifeEvent], plan_year: u32, amount: impl Fn(&LifeEvent) -> Option<f64>) -> f64 {
    events
        .iter()
        .filter(|event| event.plan_year() == plan_year)
        .filter_map(amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScenarioResolver, Validator};
    use crate::projection::HousingStatus;
    use crate::tax::{StandardTaxAdapter, TaxError, TaxResult};
    use crate::templates::{MemoryTemplateStore, TemplateKind, TemplateResolver};
    use approx::assert_relative_eq;

    const TEMPLATES: &[(TemplateKind, &str, &str)] = &[
        (
            TemplateKind::SalaryProgression,
            "flat",
            "progression: {type: explicit_array, salary_by_year: [60000], fallback: {growth_rate: 0.0}}\nbonus: {type: none}\nequity: {type: none}\n",
        ),
        (TemplateKind::HousingStrategy, "rent", "strategy: rent\nrental: {monthly_cost: 1000}\n"),
        (
            TemplateKind::HousingStrategy,
            "buy_year_2",
            "strategy: buy\nrental: {monthly_cost: 1000}\npurchase: {target_year: 2, property_price: 500000, deposit_percentage: 0.2, purchase_fees_pct: 0.02, mortgage_rate: 0.05, mortgage_term_years: 25}\n",
        ),
        (TemplateKind::ExpenseProfile, "lean", "monthly_expenses: {food: 500, bills: 500}\n"),
        (TemplateKind::TaxSystem, "uk_income_tax_ni", "tax_system_id: uk_income_tax_ni\n"),
        (TemplateKind::TaxSystem, "us_federal", "tax_system_id: us_federal\n"),
        (TemplateKind::TaxSystem, "tax_free", "tax_system_id: tax_free\n"),
    ];

    fn resolve(scenario: &str) -> ResolvedScenarioConfig {
        let mut store = MemoryTemplateStore::new();
        for (kind, name, text) in TEMPLATES {
            store.insert_template_yaml(*kind, name, text).unwrap();
        }
        let templates = TemplateResolver::new(Arc::new(store));
        let config = ScenarioResolver::new(&templates)
            .resolve(&serde_yaml::from_str(scenario).unwrap())
            .unwrap();
        Validator::new().validate(&config).unwrap();
        config
    }

    fn engine() -> ProjectionEngine {
        ProjectionEngine::new(Arc::new(StandardTaxAdapter::new()), ProjectionConfig::default())
    }

    fn single_phase(location: &str, housing: &str, years: u32, extra: &str) -> String {
        format!(
            "scenario: {{name: test}}\nplanning: {{start_year: 2025, duration_years: {years}, start_age: 30{extra}}}\ncomposition:\n  location_market: {location}\n  salary_progression: flat\n  housing_strategy: {housing}\n  expense_profile: lean\n"
        )
    }

    #[test]
    fn test_tax_free_year_by_hand() {
        let config = resolve(&single_phase("uae_dubai", "rent", 2, ", investment_return_rate: 0.1"));
        let projection = engine().project(&config).unwrap();
        assert_eq!(projection.data_points.len(), 2);

        let first = &projection.data_points[0];
        assert_eq!(first.year, 2025);
        assert_eq!(first.age, 30);
        assert_eq!(first.currency, Currency::USD);
        assert_relative_eq!(first.exchange_rate, 1.26);
        assert_relative_eq!(first.tax.total, 0.0);
        assert_relative_eq!(first.expenses.total, 24_000.0);
        assert_relative_eq!(first.annual_savings(), 36_000.0);
        // savings are held in GBP and reported in USD
        assert_relative_eq!(first.net_worth.liquid_assets, 36_000.0, epsilon = 1e-6);

        let second = &projection.data_points[1];
        assert_relative_eq!(second.net_worth.total, 36_000.0 * 1.1 + 36_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_purchase_year_shortfall_floors_savings_at_zero() {
        let config = resolve(&single_phase(
            "uk",
            "buy_year_2",
            3,
            ", initial_state: {initial_investments: 50000}",
        ));
        let projection = engine().project(&config).unwrap();
        let points = &projection.data_points;

        // deposit and fees exceed the year's income, but investments only compound
        assert_eq!(points[1].housing_status, HousingStatus::PurchaseYear);
        assert_relative_eq!(points[1].expenses.housing, 110_000.0, epsilon = 1e-6);
        assert!(points[1].annual_savings() < 0.0);
        assert_relative_eq!(
            points[1].net_worth.liquid_assets,
            points[0].net_worth.liquid_assets * 1.065,
            epsilon = 1e-6
        );

        assert_eq!(points[2].housing_status, HousingStatus::Amortizing);
        assert!(points[2].net_worth.liquid_assets > points[1].net_worth.liquid_assets);
        assert_relative_eq!(points[2].net_worth.illiquid_assets, 500_000.0);
        assert!(points[2].net_worth.liabilities < 400_000.0);
        assert_relative_eq!(
            points[2].net_worth.total,
            points[2].net_worth.liquid_assets + points[2].net_worth.illiquid_assets - points[2].net_worth.liabilities,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_life_events_hit_their_year() {
        let scenario = format!(
            "{}life_events:\n  - {{type: windfall, year: 2, amount: 10000}}\n  - {{type: one_off_expense, year: 3, amount: 5000}}\n",
            single_phase("uk", "rent", 3, "")
        );
        let projection = engine().project(&resolve(&scenario)).unwrap();
        let points = &projection.data_points;

        assert_relative_eq!(points[0].income.other, 0.0);
        assert_relative_eq!(points[1].income.other, 10_000.0);
        // windfalls are not taxed
        assert_relative_eq!(points[1].tax.total, points[0].tax.total, epsilon = 1e-9);
        assert_relative_eq!(points[2].expenses.other, 5_000.0);
    }

    #[test]
    fn test_student_loan_balance_is_repaid() {
        let config = resolve(&single_phase(
            "uk",
            "rent",
            2,
            ", initial_state: {student_loan_balance: 4000}",
        ));
        let projection = engine().project(&config).unwrap();
        let points = &projection.data_points;

        let annual = (60_000.0 - 27_295.0) * 0.09;
        assert_relative_eq!(points[0].tax.loan_repayment, annual, epsilon = 1e-6);
        assert_relative_eq!(points[1].tax.loan_repayment, 4_000.0 - annual, epsilon = 1e-6);
        assert_relative_eq!(points[1].net_worth.liabilities, 0.0, epsilon = 1e-6);
    }

    struct FailingAdapter;

    impl TaxAdapter for FailingAdapter {
        fn supported_systems(&self) -> Vec<String> {
            vec!["uk_income_tax_ni".to_string()]
        }

        fn compute_tax(&self, gross: f64, _: &str, _: i32, _: f64) -> Result<TaxResult, TaxError> {
            Err(TaxError::InvalidIncome(gross))
        }
    }

    #[test]
    fn test_tax_failure_aborts_run() {
        let engine = ProjectionEngine::new(Arc::new(FailingAdapter), ProjectionConfig::default());
        let err = engine.project(&resolve(&single_phase("uk", "rent", 3, ""))).unwrap_err();
        match err {
            PlannerError::Computation(ComputationError::Tax { year, .. }) => assert_eq!(year, 2025),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unmatched_year_is_a_computation_error() {
        let mut config = resolve(&single_phase("uk", "rent", 3, ""));
        config.planning.duration_years = Some(4);
        let err = engine().project(&config).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::Computation(ComputationError::NoPhaseForYear { plan_year: 4 })
        ));
    }

    #[test]
    fn test_missing_exchange_rate() {
        let mut config = ProjectionConfig::default();
        config.exchange_rates.remove(&Currency::USD);
        assert!(config.exchange_rate(Currency::USD).is_err());

        let planning = PlanningParams {
            exchange_rates: BTreeMap::from([(Currency::USD, 1.3), (Currency::GBP, 9.0)]),
            ..PlanningParams::default()
        };
        let merged = ProjectionConfig::default().with_planning(&planning);
        assert_relative_eq!(merged.exchange_rate(Currency::USD).unwrap(), 1.3);
        // base currency is pinned to one
        assert_relative_eq!(merged.exchange_rate(Currency::GBP).unwrap(), 1.0);
    }
}
