//! Scenario document → [`ResolvedScenarioConfig`]
//!
//! Both scenario shapes normalize to the same phase list:
//! - multi-phase: `composition.phases` maps phase name to its settings, in order
//! - single-phase: a flat `composition` becomes one phase spanning the plan

use serde::de::DeserializeOwned;
use serde_yaml::Value;

use super::{Jurisdiction, PhaseConfig, PlanningParams, ResolvedScenarioConfig, ScenarioMetadata};
use crate::error::ConfigurationError;
use crate::templates::{TemplateDocument, TemplateKind, TemplateResolver, TemplateSpec};

/// Name given to the implicit phase of a single-phase scenario
pub const SINGLE_PHASE_NAME: &str = "main_phase";

/// Resolves scenario documents through a shared [`TemplateResolver`]
pub struct ScenarioResolver<'a> {
    templates: &'a TemplateResolver,
}

impl<'a> ScenarioResolver<'a> {
    pub fn new(templates: &'a TemplateResolver) -> Self {
        Self { templates }
    }

    /// Read a scenario by id from the template source and resolve it
    pub fn load(&self, scenario_id: &str) -> Result<ResolvedScenarioConfig, ConfigurationError> {
        let document = self.templates.source().read_scenario(scenario_id)?;
        self.resolve(&document)
    }

    pub fn resolve(&self, document: &Value) -> Result<ResolvedScenarioConfig, ConfigurationError> {
        if !document.is_mapping() {
            return Err(ConfigurationError::invalid(
                "scenario",
                "document",
                "expected a mapping",
            ));
        }

        let metadata: ScenarioMetadata = parse_section(document.get("scenario"), "scenario")?;
        let planning: PlanningParams = parse_section(
            document.get("planning").or_else(|| document.get("assumptions")),
            "planning",
        )?;

        let composition = document
            .get("composition")
            .ok_or_else(|| ConfigurationError::missing("scenario", "composition"))?;

        let phases = match composition.get("phases") {
            Some(phases) => self.resolve_phases(phases)?,
            None => vec![self.resolve_single_phase(composition, &planning)?],
        };

        let events = document
            .get("life_events")
            .or_else(|| composition.get("life_events"));
        let life_events = self.resolve_life_events(events)?;

        log::info!(
            "Resolved scenario '{}' with {} phase(s)",
            metadata.name.as_deref().unwrap_or("unnamed"),
            phases.len()
        );

        Ok(ResolvedScenarioConfig {
            metadata,
            planning,
            phases,
            life_events,
        })
    }

    fn resolve_phases(&self, phases: &Value) -> Result<Vec<PhaseConfig>, ConfigurationError> {
        let phases = phases.as_mapping().ok_or_else(|| {
            ConfigurationError::invalid("composition", "phases", "expected a phase-name mapping")
        })?;

        let mut resolved = Vec::with_capacity(phases.len());
        let mut next_start = 1u32;

        for (name, settings) in phases {
            let name = name.as_str().ok_or_else(|| {
                ConfigurationError::invalid("composition.phases", "phase name", "expected a string")
            })?;
            let context = format!("phase '{name}'");

            let duration = required_u32(settings, "duration", &context)?;
            let location_market = phase_location(settings, &context)?;
            let phase = self.build_phase(name, duration, next_start, location_market, settings)?;

            next_start = next_start
                .checked_add(duration)
                .ok_or_else(|| plan_year_overflow(&context))?;
            resolved.push(phase);
        }
        Ok(resolved)
    }

    fn resolve_single_phase(
        &self,
        composition: &Value,
        planning: &PlanningParams,
    ) -> Result<PhaseConfig, ConfigurationError> {
        let location_market = composition
            .get("location_market")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigurationError::missing("composition", "location_market"))?
            .to_string();
        // A missing planning duration is reported by the validator
        let duration = planning.duration_years.unwrap_or(0);
        self.build_phase(SINGLE_PHASE_NAME, duration, 1, location_market, composition)
    }

    fn build_phase(
        &self,
        name: &str,
        duration: u32,
        start_plan_year: u32,
        location_market: String,
        settings: &Value,
    ) -> Result<PhaseConfig, ConfigurationError> {
        let end_plan_year = start_plan_year
            .checked_add(duration)
            .map(|next| next.saturating_sub(1))
            .ok_or_else(|| plan_year_overflow(&format!("phase '{name}'")))?;

        let tax_system = match settings.get("tax_system") {
            Some(Value::Null) => None,
            Some(spec) => Some(self.load_spec(TemplateKind::TaxSystem, spec)?),
            None => {
                let default = Jurisdiction::from_location(&location_market).default_tax_system();
                Some(self.templates.load_named(TemplateKind::TaxSystem, default)?)
            }
        };

        Ok(PhaseConfig {
            name: name.to_string(),
            duration,
            start_plan_year,
            end_plan_year,
            salary_progression: self.optional(TemplateKind::SalaryProgression, settings, "salary_progression")?,
            housing_strategy: self.optional(TemplateKind::HousingStrategy, settings, "housing_strategy")?,
            expense_profile: self.optional(TemplateKind::ExpenseProfile, settings, "expense_profile")?,
            investment_strategy: self.optional(TemplateKind::InvestmentStrategy, settings, "investment_strategy")?,
            tax_system,
            location_market,
        })
    }

    /// An absent reference yields `None`; a reference to a missing file is an error
    fn optional(
        &self,
        kind: TemplateKind,
        settings: &Value,
        key: &str,
    ) -> Result<Option<TemplateDocument>, ConfigurationError> {
        match settings.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(spec) => self.load_spec(kind, spec).map(Some),
        }
    }

    fn load_spec(&self, kind: TemplateKind, spec: &Value) -> Result<TemplateDocument, ConfigurationError> {
        let spec = TemplateSpec::from_value(kind, spec)?;
        self.templates.load(kind, &spec)
    }

    fn resolve_life_events(
        &self,
        events: Option<&Value>,
    ) -> Result<Vec<TemplateDocument>, ConfigurationError> {
        let events = match events {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Sequence(events)) => events,
            Some(_) => {
                return Err(ConfigurationError::invalid(
                    "scenario",
                    "life_events",
                    "expected a list",
                ))
            }
        };

        events
            .iter()
            .enumerate()
            .map(|(index, event)| {
                if event.get("template").is_some() {
                    self.load_spec(TemplateKind::LifeEvent, event)
                } else {
                    Ok(TemplateDocument::new(
                        TemplateKind::LifeEvent,
                        format!("inline_{index}"),
                        event.clone(),
                    ))
                }
            })
            .collect()
    }
}

fn parse_section<T: DeserializeOwned + Default>(
    section: Option<&Value>,
    context: &str,
) -> Result<T, ConfigurationError> {
    match section {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_yaml::from_value(value.clone()).map_err(|source| {
            ConfigurationError::Malformed {
                context: context.to_string(),
                source,
            }
        }),
    }
}

fn plan_year_overflow(context: &str) -> ConfigurationError {
    ConfigurationError::invalid(context, "duration", "plan-year overflow")
}

fn required_u32(settings: &Value, field: &str, context: &str) -> Result<u32, ConfigurationError> {
    let value = settings
        .get(field)
        .ok_or_else(|| ConfigurationError::missing(context, field))?;
    value
        .as_u64()
        .and_then(|raw| u32::try_from(raw).ok())
        .ok_or_else(|| ConfigurationError::invalid(context, field, "expected a non-negative integer"))
}

/// `location: { market: us_seattle }` or `location: us_seattle`
fn phase_location(settings: &Value, context: &str) -> Result<String, ConfigurationError> {
    let location = settings
        .get("location")
        .ok_or_else(|| ConfigurationError::missing(context, "location"))?;
    let market = match location {
        Value::String(market) => Some(market.as_str()),
        Value::Mapping(_) => location.get("market").and_then(Value::as_str),
        _ => None,
    };
    market
        .map(str::to_string)
        .ok_or_else(|| ConfigurationError::missing(format!("{context} location"), "market"))
}
