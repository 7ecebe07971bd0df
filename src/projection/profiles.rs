//! Typed views over a phase's resolved templates
//!
//! Each view is deserialized once per run and checked for the fields the
//! simulation will consult, so a missing value fails before any plan-year
//! is projected.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::lookup::YearTable;
use crate::config::PhaseConfig;
use crate::error::ConfigurationError;
use crate::templates::TemplateDocument;

#[derive(Debug, Clone, Deserialize)]
pub struct SalaryProgression {
    pub progression: ProgressionRule,
    pub bonus: CompensationComponent,
    pub equity: CompensationComponent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressionRule {
    /// Salary listed per plan-year, extrapolated at `fallback.growth_rate`
    ExplicitArray {
        salary_by_year: Vec<f64>,
        #[serde(default)]
        fallback: Option<FallbackGrowth>,
    },
    /// Base salary compounded by a year-keyed growth table
    PercentageGrowth {
        base_salary: f64,
        growth_by_year: YearTable<f64>,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FallbackGrowth {
    pub growth_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    PercentageOfSalary,
    None,
}

/// Bonus or equity compensation
#[derive(Debug, Clone, Deserialize)]
pub struct CompensationComponent {
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    #[serde(default)]
    pub rates_by_year: Option<YearTable<f64>>,
    #[serde(default)]
    pub events: Vec<CompensationEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationEventKind {
    IpoMultiplier,
    #[serde(other)]
    Unrecognized,
}

/// A one-off step change in a component's value
#[derive(Debug, Clone, Deserialize)]
pub struct CompensationEvent {
    pub year: u32,
    #[serde(rename = "type")]
    pub kind: CompensationEventKind,
    #[serde(default)]
    pub multiplier: Option<f64>,
}

/// One year of employment income
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Compensation {
    pub salary: f64,
    pub bonus: f64,
    pub equity: f64,
}

impl Compensation {
    pub fn total(&self) -> f64 {
        self.salary + self.bonus + self.equity
    }
}

impl SalaryProgression {
    /// Reject shapes the projection would have to default its way through
    fn check(&self, context: &str, last_plan_year: u32) -> Result<(), ConfigurationError> {
        if let ProgressionRule::ExplicitArray { salary_by_year, fallback } = &self.progression {
            if salary_by_year.is_empty() {
                return Err(ConfigurationError::invalid(context, "salary_by_year", "must not be empty"));
            }
            let covered = u32::try_from(salary_by_year.len()).unwrap_or(u32::MAX);
            if covered < last_plan_year && fallback.is_none() {
                return Err(ConfigurationError::missing(context, "fallback.growth_rate"));
            }
        }
        self.bonus.check(&format!("{context} bonus"))?;
        self.equity.check(&format!("{context} equity"))
    }

    /// Base salary for a plan-year
    pub fn base_salary(&self, plan_year: u32) -> f64 {
        match &self.progression {
            ProgressionRule::ExplicitArray { salary_by_year, fallback } => {
                let index = plan_year.max(1) as usize - 1;
                match salary_by_year.get(index) {
                    Some(salary) => *salary,
                    None => {
                        let last = salary_by_year.last().copied().unwrap_or_default();
                        let growth = fallback.map_or(0.0, |f| f.growth_rate);
                        let beyond = plan_year as usize - salary_by_year.len();
                        last * (1.0 + growth).powi(beyond as i32)
                    }
                }
            }
            ProgressionRule::PercentageGrowth { base_salary, growth_by_year } => {
                // unmatched years leave the salary unchanged
                (2..=plan_year).fold(*base_salary, |salary, year| {
                    salary * (1.0 + growth_by_year.get_or(year, 0.0))
                })
            }
        }
    }

    pub fn compensation(&self, plan_year: u32) -> Compensation {
        let salary = self.base_salary(plan_year);
        Compensation {
            salary,
            bonus: self.bonus.amount(salary, plan_year),
            equity: self.equity.amount(salary, plan_year),
        }
    }
}

impl CompensationComponent {
    fn check(&self, context: &str) -> Result<(), ConfigurationError> {
        if self.kind == ComponentKind::PercentageOfSalary && self.rates_by_year.is_none() {
            return Err(ConfigurationError::missing(context, "rates_by_year"));
        }
        for event in &self.events {
            if event.kind == CompensationEventKind::IpoMultiplier && event.multiplier.is_none() {
                return Err(ConfigurationError::missing(
                    format!("{context} event in year {}", event.year),
                    "multiplier",
                ));
            }
        }
        Ok(())
    }

    pub fn amount(&self, salary: f64, plan_year: u32) -> f64 {
        let base = match (&self.kind, &self.rates_by_year) {
            (ComponentKind::PercentageOfSalary, Some(rates)) => salary * rates.get_or(plan_year, 0.0),
            _ => 0.0,
        };
        self.events
            .iter()
            .filter(|event| event.year == plan_year && event.kind == CompensationEventKind::IpoMultiplier)
            .fold(base, |amount, event| amount * event.multiplier.unwrap_or(1.0))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RentalTerms {
    pub monthly_cost: f64,
}

impl RentalTerms {
    pub fn annual_cost(&self) -> f64 {
        self.monthly_cost * 12.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchasePlan {
    /// Plan-year the purchase completes in
    pub target_year: u32,
    pub property_price: f64,
    pub deposit_percentage: f64,
    pub purchase_fees_pct: f64,
    pub mortgage_rate: f64,
    pub mortgage_term_years: u32,
}

impl PurchasePlan {
    pub fn deposit(&self) -> f64 {
        self.property_price * self.deposit_percentage
    }

    pub fn fees(&self) -> f64 {
        self.property_price * self.purchase_fees_pct
    }

    pub fn loan_amount(&self) -> f64 {
        (self.property_price - self.deposit()).max(0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum HousingStrategy {
    Rent {
        rental: RentalTerms,
    },
    #[serde(alias = "purchase")]
    Buy {
        /// Needed for years spent renting before the purchase
        #[serde(default)]
        rental: Option<RentalTerms>,
        purchase: PurchasePlan,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseProfile {
    #[serde(default)]
    pub monthly_expenses: BTreeMap<String, f64>,
    #[serde(default)]
    pub annual_expenses: BTreeMap<String, f64>,
    #[serde(default)]
    pub progression: Option<ExpenseProgression>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseProgression {
    #[serde(default)]
    pub adjustments_by_year: YearTable<ExpenseAdjustment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ExpenseAdjustment {
    #[serde(default)]
    pub income_percentage: f64,
    #[serde(default = "unit_factor")]
    pub lifestyle_factor: f64,
}

fn unit_factor() -> f64 {
    1.0
}

impl ExpenseProfile {
    /// Recurring monthly items annualized, plus annual items
    pub fn baseline(&self) -> f64 {
        self.monthly_expenses.values().sum::<f64>() * 12.0 + self.annual_expenses.values().sum::<f64>()
    }

    /// Living costs for a plan-year: the baseline, or when an adjustment
    /// applies, the larger of the lifestyle-scaled baseline and the
    /// income-proportional target
    pub fn annual_total(&self, plan_year: u32, net_income: f64) -> f64 {
        let baseline = self.baseline();
        let adjustment = self
            .progression
            .as_ref()
            .and_then(|progression| progression.adjustments_by_year.get(plan_year));
        match adjustment {
            Some(adj) => (baseline * adj.lifestyle_factor).max(net_income * adj.income_percentage),
            None => baseline,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvestmentStrategy {
    pub contribution_rules: ContributionRules,
    pub allocation: Allocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContributionRules {
    pub regular_contributions: RegularContributions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegularContributions {
    pub percentage_of_income: f64,
    #[serde(default)]
    pub minimum_monthly: Option<f64>,
    #[serde(default)]
    pub maximum_monthly: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Allocation {
    pub by_career_stage: CareerStageAllocations,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CareerStageAllocations {
    pub early_career: StageAllocation,
    pub mid_career: StageAllocation,
    pub late_career: StageAllocation,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StageAllocation {
    pub retirement_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CareerStage {
    Early,
    Mid,
    Late,
}

impl CareerStage {
    pub fn for_plan_year(plan_year: u32) -> Self {
        match plan_year {
            0..=5 => CareerStage::Early,
            6..=15 => CareerStage::Mid,
            _ => CareerStage::Late,
        }
    }
}

/// Investment target split between retirement and taxable accounts
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContributionSplit {
    pub retirement: f64,
    pub taxable: f64,
}

impl ContributionSplit {
    pub fn total(&self) -> f64 {
        self.retirement + self.taxable
    }
}

impl InvestmentStrategy {
    pub fn contributions(&self, plan_year: u32, net_income: f64) -> ContributionSplit {
        let rules = &self.contribution_rules.regular_contributions;
        let mut target = net_income * rules.percentage_of_income;
        if let Some(maximum) = rules.maximum_monthly {
            target = target.min(maximum * 12.0);
        }
        if let Some(minimum) = rules.minimum_monthly {
            target = target.max(minimum * 12.0);
        }

        let stages = &self.allocation.by_career_stage;
        let stage = match CareerStage::for_plan_year(plan_year) {
            CareerStage::Early => stages.early_career,
            CareerStage::Mid => stages.mid_career,
            CareerStage::Late => stages.late_career,
        };
        let retirement = target * stage.retirement_percentage;
        ContributionSplit {
            retirement,
            taxable: target - retirement,
        }
    }
}

/// A dated cash event keyed by plan-year
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifeEvent {
    OneOffExpense { year: u32, amount: f64 },
    Windfall { year: u32, amount: f64 },
}

impl LifeEvent {
    pub fn from_document(document: &TemplateDocument) -> Result<Self, ConfigurationError> {
        document.parse()
    }

    pub fn plan_year(&self) -> u32 {
        match self {
            LifeEvent::OneOffExpense { year, .. } | LifeEvent::Windfall { year, .. } => *year,
        }
    }
}

/// Everything the engine reads from one phase, parsed up front
#[derive(Debug, Clone)]
pub struct PhaseProfiles {
    pub salary: SalaryProgression,
    pub housing: HousingStrategy,
    pub expenses: ExpenseProfile,
    pub investments: Option<InvestmentStrategy>,
    pub tax_system_id: String,
}

impl PhaseProfiles {
    pub fn from_phase(phase: &PhaseConfig) -> Result<Self, ConfigurationError> {
        let context = format!("phase '{}'", phase.name);
        let required = |doc: &Option<TemplateDocument>, field: &str| {
            doc.clone()
                .ok_or_else(|| ConfigurationError::missing(context.clone(), field))
        };

        let salary_doc = required(&phase.salary_progression, "salary_progression")?;
        let salary: SalaryProgression = salary_doc.parse()?;
        salary.check(
            &format!("salary progression '{}'", salary_doc.name),
            phase.end_plan_year,
        )?;

        let housing: HousingStrategy = required(&phase.housing_strategy, "housing_strategy")?.parse()?;
        let expenses: ExpenseProfile = required(&phase.expense_profile, "expense_profile")?.parse()?;
        let investments = phase
            .investment_strategy
            .as_ref()
            .map(TemplateDocument::parse)
            .transpose()?;

        let tax_system_id = required(&phase.tax_system, "tax_system")?
            .tax_system_id()
            .map(str::to_string)
            .ok_or_else(|| ConfigurationError::missing(format!("{context} tax system"), "tax_system_id"))?;

        Ok(Self {
            salary,
            housing,
            expenses,
            investments,
            tax_system_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse<T: serde::de::DeserializeOwned>(text: &str) -> T {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_explicit_array_with_fallback() {
        let salary: SalaryProgression = parse(
            "progression:\n  type: explicit_array\n  salary_by_year: [30000, 33000, 36000]\n  fallback: {growth_rate: 0.05}\nbonus: {type: none}\nequity: {type: none}\n",
        );
        assert_relative_eq!(salary.base_salary(2), 33_000.0);
        assert_relative_eq!(salary.base_salary(3), 36_000.0);
        assert_relative_eq!(salary.base_salary(5), 36_000.0 * 1.05 * 1.05, epsilon = 1e-6);
    }

    #[test]
    fn test_percentage_growth_compounds_from_year_two() {
        let salary: SalaryProgression = parse(
            "progression:\n  type: percentage_growth\n  base_salary: 50000\n  growth_by_year: {'2-3': 0.10, '5+': 0.02}\nbonus: {type: none}\nequity: {type: none}\n",
        );
        assert_relative_eq!(salary.base_salary(1), 50_000.0);
        assert_relative_eq!(salary.base_salary(3), 60_500.0, epsilon = 1e-6);
        // year 4 has no rate and leaves the salary unchanged
        assert_relative_eq!(salary.base_salary(4), 60_500.0, epsilon = 1e-6);
        assert_relative_eq!(salary.base_salary(5), 61_710.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bonus_equity_and_ipo_event() {
        let salary: SalaryProgression = parse(
            r#"
progression: {type: explicit_array, salary_by_year: [100000, 100000, 100000]}
bonus:
  type: percentage_of_salary
  rates_by_year: {'1+': 0.10}
equity:
  type: percentage_of_salary
  rates_by_year: [0.2, 0.2]
  events:
    - {year: 2, type: ipo_multiplier, multiplier: 3.0}
    - {year: 2, type: secondary_sale}
"#,
        );
        let year1 = salary.compensation(1);
        assert_relative_eq!(year1.bonus, 10_000.0, epsilon = 1e-6);
        assert_relative_eq!(year1.equity, 20_000.0, epsilon = 1e-6);

        let year2 = salary.compensation(2);
        assert_relative_eq!(year2.equity, 60_000.0, epsilon = 1e-6);

        // past the rate list the component pays nothing
        let year3 = salary.compensation(3);
        assert_relative_eq!(year3.equity, 0.0);
        assert_relative_eq!(year3.total(), 110_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_percentage_component_requires_rates() {
        let salary: SalaryProgression = parse(
            "progression: {type: explicit_array, salary_by_year: [1]}\nbonus: {type: percentage_of_salary}\nequity: {type: none}\n",
        );
        assert!(matches!(
            salary.check("salary progression 'x'", 1),
            Err(ConfigurationError::MissingField { .. })
        ));
    }

    #[test]
    fn test_explicit_array_without_fallback_rejected_past_end() {
        let salary: SalaryProgression = parse(
            "progression: {type: explicit_array, salary_by_year: [1, 2]}\nbonus: {type: none}\nequity: {type: none}\n",
        );
        assert!(salary.check("s", 2).is_ok());
        assert!(salary.check("s", 3).is_err());
    }

    #[test]
    fn test_expense_adjustment_takes_greater_target() {
        let profile: ExpenseProfile = parse(
            r#"
monthly_expenses: {food: 500, transport: 500}
annual_expenses: {holidays: 3000}
progression:
  adjustments_by_year:
    '1-2': {lifestyle_factor: 1.0}
    '3+': {income_percentage: 0.5, lifestyle_factor: 1.1}
"#,
        );
        assert_relative_eq!(profile.baseline(), 15_000.0);
        assert_relative_eq!(profile.annual_total(1, 100_000.0), 15_000.0);
        // income-based target wins
        assert_relative_eq!(profile.annual_total(3, 40_000.0), 20_000.0);
        // lifestyle-scaled baseline wins
        assert_relative_eq!(profile.annual_total(3, 20_000.0), 16_500.0, epsilon = 1e-6);
    }

    #[test]
    fn test_investment_limits_and_career_stage() {
        let strategy: InvestmentStrategy = parse(
            r#"
contribution_rules:
  regular_contributions: {percentage_of_income: 0.2, minimum_monthly: 500, maximum_monthly: 2000}
allocation:
  by_career_stage:
    early_career: {retirement_percentage: 0.5}
    mid_career: {retirement_percentage: 0.7}
    late_career: {retirement_percentage: 0.9}
"#,
        );
        // clamped up to the minimum
        let low = strategy.contributions(1, 10_000.0);
        assert_relative_eq!(low.total(), 6_000.0, epsilon = 1e-9);
        assert_relative_eq!(low.retirement, 3_000.0, epsilon = 1e-9);

        // clamped down to the maximum, mid-career split
        let high = strategy.contributions(6, 500_000.0);
        assert_relative_eq!(high.total(), 24_000.0, epsilon = 1e-9);
        assert_relative_eq!(high.retirement, 16_800.0, epsilon = 1e-9);

        assert_eq!(CareerStage::for_plan_year(5), CareerStage::Early);
        assert_eq!(CareerStage::for_plan_year(15), CareerStage::Mid);
        assert_eq!(CareerStage::for_plan_year(16), CareerStage::Late);
    }

    #[test]
    fn test_housing_strategy_shapes() {
        let rent: HousingStrategy = parse("strategy: rent\nrental: {monthly_cost: 1500}\n");
        assert!(matches!(rent, HousingStrategy::Rent { .. }));

        let buy: HousingStrategy = parse(
            "strategy: buy\npurchase: {target_year: 3, property_price: 300000, deposit_percentage: 0.1, purchase_fees_pct: 0.02, mortgage_rate: 0.05, mortgage_term_years: 25}\n",
        );
        match buy {
            HousingStrategy::Buy { rental, purchase } => {
                assert!(rental.is_none());
                assert_relative_eq!(purchase.deposit(), 30_000.0, epsilon = 1e-9);
                assert_relative_eq!(purchase.loan_amount(), 270_000.0, epsilon = 1e-9);
            }
            other => panic!("unexpected strategy {other:?}"),
        }

        assert!(serde_yaml::from_str::<HousingStrategy>("strategy: rent\n").is_err());
    }

    #[test]
    fn test_life_event_shapes() {
        let event: LifeEvent = parse("type: one_off_expense\nyear: 4\namount: 20000\n");
        assert_eq!(event, LifeEvent::OneOffExpense { year: 4, amount: 20_000.0 });
        assert_eq!(event.plan_year(), 4);
        assert!(serde_yaml::from_str::<LifeEvent>("type: lottery\nyear: 1\namount: 1\n").is_err());
    }
}
