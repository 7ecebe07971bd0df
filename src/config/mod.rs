//! Resolved scenario configuration
//!
//! A scenario document is normalized into planning parameters plus an
//! ordered list of contiguous phases, each holding fully merged templates.

mod location;
mod resolver;
mod validator;

pub use location::{Currency, Jurisdiction, TAX_FREE_SYSTEM, UK_TAX_SYSTEM, US_TAX_SYSTEM};
pub use resolver::{ScenarioResolver, SINGLE_PHASE_NAME};
pub use validator::Validator;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::templates::TemplateDocument;

/// Name and description from the scenario's `scenario` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Balances the projection starts from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    #[serde(default)]
    pub initial_investments: f64,
    #[serde(default)]
    pub initial_property_value: f64,
    #[serde(default)]
    pub initial_mortgage: f64,
    #[serde(default)]
    pub student_loan_balance: f64,
}

/// The `planning` section. Required fields stay optional here so the
/// validator can report every missing one at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningParams {
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default, alias = "plan_duration_years")]
    pub duration_years: Option<u32>,
    #[serde(default)]
    pub start_age: Option<u32>,
    #[serde(default)]
    pub initial_state: InitialState,
    /// Overrides the engine's annual investment return
    #[serde(default)]
    pub investment_return_rate: Option<f64>,
    /// Units of each currency per unit of base currency
    #[serde(default)]
    pub exchange_rates: BTreeMap<Currency, f64>,
}

/// Planning fields the engine cannot run without
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanningHorizon {
    pub start_year: i32,
    pub duration_years: u32,
    pub start_age: u32,
}

impl PlanningParams {
    pub fn horizon(&self) -> Result<PlanningHorizon, ConfigurationError> {
        Ok(PlanningHorizon {
            start_year: self
                .start_year
                .ok_or_else(|| ConfigurationError::missing("planning", "start_year"))?,
            duration_years: self
                .duration_years
                .ok_or_else(|| ConfigurationError::missing("planning", "duration_years"))?,
            start_age: self
                .start_age
                .ok_or_else(|| ConfigurationError::missing("planning", "start_age"))?,
        })
    }
}

/// One contiguous span of plan-years sharing a location and template set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseConfig {
    pub name: String,
    pub duration: u32,
    /// First plan-year covered (1-based, inclusive)
    pub start_plan_year: u32,
    /// Last plan-year covered (inclusive)
    pub end_plan_year: u32,
    pub location_market: String,
    pub salary_progression: Option<TemplateDocument>,
    pub housing_strategy: Option<TemplateDocument>,
    pub tax_system: Option<TemplateDocument>,
    pub expense_profile: Option<TemplateDocument>,
    pub investment_strategy: Option<TemplateDocument>,
}

impl PhaseConfig {
    pub fn covers(&self, plan_year: u32) -> bool {
        self.start_plan_year <= plan_year && plan_year <= self.end_plan_year
    }

    pub fn jurisdiction(&self) -> Jurisdiction {
        Jurisdiction::from_location(&self.location_market)
    }

    pub fn currency(&self) -> Currency {
        self.jurisdiction().currency()
    }
}

/// A scenario ready for validation and simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedScenarioConfig {
    pub metadata: ScenarioMetadata,
    pub planning: PlanningParams,
    /// Phases in plan order; single-phase scenarios hold one
    pub phases: Vec<PhaseConfig>,
    pub life_events: Vec<TemplateDocument>,
}

impl ResolvedScenarioConfig {
    pub fn is_multi_phase(&self) -> bool {
        self.phases.len() > 1
    }

    pub fn phase_for_year(&self, plan_year: u32) -> Option<&PhaseConfig> {
        self.phases.iter().find(|phase| phase.covers(plan_year))
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unnamed")
    }
}
