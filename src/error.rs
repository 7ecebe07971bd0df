//! Error taxonomy for template resolution, validation and projection
//!
//! Loading and merging fail fast with a [`ConfigurationError`]. Validation
//! collects every violated invariant into a single [`ValidationError`].
//! Failures while simulating a plan-year surface as [`ComputationError`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::tax::TaxError;
use crate::templates::TemplateKind;

/// An `extends` chain that revisits a template it has already walked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("inheritance cycle in {kind} templates: {}", chain.join(" -> "))]
pub struct CycleError {
    pub kind: TemplateKind,
    /// Template names in walk order, ending with the repeated name
    pub chain: Vec<String>,
}

/// A required template or scenario field is missing or malformed
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{kind} template '{name}' not found at {}", path.display())]
    TemplateNotFound {
        kind: TemplateKind,
        name: String,
        path: PathBuf,
    },

    #[error("scenario '{id}' not found at {}", path.display())]
    ScenarioNotFound { id: String, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{kind} template specification must include a 'template' field")]
    MissingTemplateName { kind: TemplateKind },

    #[error("{context} missing required '{field}'")]
    MissingField { context: String, field: String },

    #[error("{context}: invalid '{field}': {reason}")]
    InvalidField {
        context: String,
        field: String,
        reason: String,
    },

    #[error("{context} is malformed: {source}")]
    Malformed {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Cycle(#[from] CycleError),
}

impl ConfigurationError {
    pub(crate) fn missing(context: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }

    pub(crate) fn invalid(
        context: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            context: context.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Every structural invariant a resolved scenario violates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration validation failed:")?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

/// A failure while simulating a plan-year
#[derive(Debug, Error)]
pub enum ComputationError {
    #[error("no phase covers plan-year {plan_year}")]
    NoPhaseForYear { plan_year: u32 },

    #[error("tax calculation for '{tax_system_id}' in {year} failed: {source}")]
    Tax {
        tax_system_id: String,
        year: i32,
        #[source]
        source: TaxError,
    },

    #[error("degenerate mortgage: {reason}")]
    DegenerateMortgage { reason: String },

    #[error("non-finite {quantity} in plan-year {plan_year}")]
    NonFinite {
        quantity: &'static str,
        plan_year: u32,
    },
}

/// Any failure that aborts a scenario run
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Computation(#[from] ComputationError),
}

impl From<CycleError> for PlannerError {
    fn from(err: CycleError) -> Self {
        Self::Configuration(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_every_violation() {
        let err = ValidationError {
            violations: vec![
                "Phase 0 missing salary_progression".to_string(),
                "Phase 0 missing valid tax_system".to_string(),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("salary_progression"));
        assert!(text.contains("tax_system"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_cycle_error_shows_chain() {
        let err = CycleError {
            kind: TemplateKind::SalaryProgression,
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "inheritance cycle in salary_progressions templates: a -> b -> a"
        );
    }
}
