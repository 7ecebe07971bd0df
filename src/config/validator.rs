//! Exhaustive structural checks over a resolved scenario
//!
//! Validation never stops at the first problem; every violation is
//! collected and reported together in one [`ValidationError`].

use std::collections::BTreeSet;

use serde_yaml::Value;

use super::{PhaseConfig, ResolvedScenarioConfig};
use crate::error::ValidationError;
use crate::tax::TaxAdapter;

const EXPLICIT_ARRAY: &str = "explicit_array";
const PERCENTAGE_GROWTH: &str = "percentage_growth";

/// Structural validator for [`ResolvedScenarioConfig`]
#[derive(Debug, Clone, Default)]
pub struct Validator {
    /// When set, every phase's tax-system id must be one of these
    known_tax_systems: Option<BTreeSet<String>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known_tax_systems<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_tax_systems: Some(ids.into_iter().map(Into::into).collect()),
        }
    }

    /// Validator that accepts only the systems `adapter` supports
    pub fn for_adapter(adapter: &dyn TaxAdapter) -> Self {
        Self::with_known_tax_systems(adapter.supported_systems())
    }

    pub fn validate(&self, config: &ResolvedScenarioConfig) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        if config.metadata.name.as_deref().map_or(true, |name| name.trim().is_empty()) {
            violations.push("scenario missing required 'name'".to_string());
        }

        let planning = &config.planning;
        if planning.start_year.is_none() {
            violations.push("planning missing required 'start_year'".to_string());
        }
        if planning.duration_years.is_none() {
            violations.push("planning missing required 'duration_years'".to_string());
        }
        if planning.start_age.is_none() {
            violations.push("planning missing required 'start_age'".to_string());
        }

        self.check_phases(config, &mut violations);

        if violations.is_empty() {
            Ok(())
        } else {
            log::debug!(
                "Scenario '{}' failed validation with {} violation(s)",
                config.name(),
                violations.len()
            );
            Err(ValidationError { violations })
        }
    }

    fn check_phases(&self, config: &ResolvedScenarioConfig, violations: &mut Vec<String>) {
        if config.phases.is_empty() {
            violations.push("scenario must have at least one phase".to_string());
            return;
        }

        let total: u64 = config.phases.iter().map(|phase| u64::from(phase.duration)).sum();
        if let Some(expected) = config.planning.duration_years {
            if total != u64::from(expected) {
                violations.push(format!(
                    "phase durations ({total}) don't match planning duration ({expected})"
                ));
            }
        }

        let mut expected_start = 1;
        for (index, phase) in config.phases.iter().enumerate() {
            if phase.start_plan_year != expected_start {
                violations.push(format!(
                    "Phase {index} ('{}') starts at plan-year {} but plan-year {expected_start} is next",
                    phase.name, phase.start_plan_year
                ));
            }
            expected_start = phase.end_plan_year.saturating_add(1);
            self.check_phase(index, phase, violations);
        }
    }

    fn check_phase(&self, index: usize, phase: &PhaseConfig, violations: &mut Vec<String>) {
        if phase.duration == 0 {
            violations.push(format!("Phase {index} ('{}') has zero duration", phase.name));
        }

        match phase.salary_progression.as_ref().filter(|doc| !doc.is_empty()) {
            Some(salary) => check_salary_structure(index, phase, salary.body(), violations),
            None => violations.push(format!("Phase {index} missing salary_progression")),
        }

        match phase.tax_system.as_ref().and_then(|doc| doc.tax_system_id()) {
            None => violations.push(format!("Phase {index} missing valid tax_system")),
            Some(id) => {
                if let Some(known) = &self.known_tax_systems {
                    if !known.contains(id) {
                        violations.push(format!(
                            "Phase {index} tax_system '{id}' is not supported by the tax adapter"
                        ));
                    }
                }
            }
        }

        if phase.housing_strategy.as_ref().map_or(true, |doc| doc.is_empty()) {
            violations.push(format!("Phase {index} missing housing_strategy"));
        }
        if phase.expense_profile.as_ref().map_or(true, |doc| doc.is_empty()) {
            violations.push(format!("Phase {index} missing expense_profile"));
        }
    }
}

fn check_salary_structure(
    index: usize,
    phase: &PhaseConfig,
    salary: &Value,
    violations: &mut Vec<String>,
) {
    let Some(progression) = salary.get("progression") else {
        violations.push(format!("Phase {index} salary_progression missing 'progression'"));
        return;
    };

    match progression.get("type").and_then(Value::as_str) {
        Some(EXPLICIT_ARRAY) => match progression.get("salary_by_year") {
            Some(Value::Sequence(values)) => {
                // Years past the array need a growth rate to extrapolate with
                let covered = u32::try_from(values.len()).unwrap_or(u32::MAX);
                let has_fallback = progression
                    .get("fallback")
                    .and_then(|fallback| fallback.get("growth_rate"))
                    .is_some();
                if values.is_empty() {
                    violations.push(format!(
                        "Phase {index} explicit array progression has an empty salary_by_year"
                    ));
                } else if covered < phase.end_plan_year && !has_fallback {
                    violations.push(format!(
                        "Phase {index} explicit array progression covers {covered} year(s) \
                         but the phase runs to plan-year {} without a fallback growth_rate",
                        phase.end_plan_year
                    ));
                }
            }
            Some(_) => violations.push(format!(
                "Phase {index} explicit array progression salary_by_year must be a list"
            )),
            None => violations.push(format!(
                "Phase {index} explicit array progression missing salary_by_year"
            )),
        },
        Some(PERCENTAGE_GROWTH) => {
            if progression.get("base_salary").is_none() {
                violations.push(format!(
                    "Phase {index} percentage growth progression missing base_salary"
                ));
            }
            if progression.get("growth_by_year").is_none() {
                violations.push(format!(
                    "Phase {index} percentage growth progression missing growth_by_year"
                ));
            }
        }
        Some(other) => violations.push(format!(
            "Phase {index} salary progression has unknown type '{other}'"
        )),
        None => violations.push(format!("Phase {index} salary progression missing 'type'")),
    }
}
