//! Template documents, their sources, and inheritance resolution
//!
//! A template is a named, typed YAML document. It may declare an `extends`
//! parent and an `overrides` fragment; [`TemplateResolver`] walks the chain
//! root-to-leaf and caches the merged result for the lifetime of a run.

mod merge;
mod resolver;
mod store;

pub use merge::{apply_template_layer, merge_values};
pub use resolver::TemplateResolver;
pub use store::{FsTemplateStore, MemoryTemplateStore, TemplateSource, DEFAULT_CONFIG_ROOT};

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::ConfigurationError;

/// The typed locations a template can be read from
/// Serialized under the same directory name [`TemplateKind::dir_name`] returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TemplateKind {
    #[serde(rename = "salary_progressions")]
    SalaryProgression,
    #[serde(rename = "housing_strategies")]
    HousingStrategy,
    #[serde(rename = "expense_profiles")]
    ExpenseProfile,
    #[serde(rename = "investment_strategies")]
    InvestmentStrategy,
    #[serde(rename = "life_events")]
    LifeEvent,
    #[serde(rename = "tax_systems")]
    TaxSystem,
}

impl TemplateKind {
    /// Directory name holding documents of this kind
    pub fn dir_name(self) -> &'static str {
        match self {
            TemplateKind::SalaryProgression => "salary_progressions",
            TemplateKind::HousingStrategy => "housing_strategies",
            TemplateKind::ExpenseProfile => "expense_profiles",
            TemplateKind::InvestmentStrategy => "investment_strategies",
            TemplateKind::LifeEvent => "life_events",
            TemplateKind::TaxSystem => "tax_systems",
        }
    }

    /// Path of this kind's directory relative to the config root.
    /// Tax systems sit beside `templates/`, everything else inside it.
    pub fn relative_dir(self) -> String {
        match self {
            TemplateKind::TaxSystem => self.dir_name().to_string(),
            _ => format!("templates/{}", self.dir_name()),
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Reference to a template: a bare name, or a base name plus inline overrides
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSpec {
    Name(String),
    WithOverrides { template: String, overrides: Mapping },
}

impl TemplateSpec {
    /// Parse a reference as written in a scenario document
    pub fn from_value(kind: TemplateKind, value: &Value) -> Result<Self, ConfigurationError> {
        match value {
            Value::String(name) => Ok(TemplateSpec::Name(name.clone())),
            Value::Mapping(map) => {
                let template = match map.get("template") {
                    Some(Value::String(name)) => name.clone(),
                    Some(_) => {
                        return Err(ConfigurationError::invalid(
                            format!("{kind} template specification"),
                            "template",
                            "expected a template name",
                        ))
                    }
                    None => return Err(ConfigurationError::MissingTemplateName { kind }),
                };
                let overrides: Mapping = map
                    .iter()
                    .filter(|(key, _)| key.as_str() != Some("template"))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                if overrides.is_empty() {
                    Ok(TemplateSpec::Name(template))
                } else {
                    Ok(TemplateSpec::WithOverrides { template, overrides })
                }
            }
            _ => Err(ConfigurationError::invalid(
                format!("{kind} template specification"),
                "template",
                "expected a name or a mapping with a 'template' field",
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TemplateSpec::Name(name) => name,
            TemplateSpec::WithOverrides { template, .. } => template,
        }
    }
}

impl From<&str> for TemplateSpec {
    fn from(name: &str) -> Self {
        TemplateSpec::Name(name.to_string())
    }
}

/// A fully merged template. Consumers receive their own copy of the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateDocument {
    pub kind: TemplateKind,
    pub name: String,
    body: Value,
}

impl TemplateDocument {
    pub fn new(kind: TemplateKind, name: impl Into<String>, body: Value) -> Self {
        Self {
            kind,
            name: name.into(),
            body,
        }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Top-level field lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// True when the document carries no fields at all
    pub fn is_empty(&self) -> bool {
        match &self.body {
            Value::Null => true,
            Value::Mapping(map) => map.is_empty(),
            _ => false,
        }
    }

    /// The identifier a tax-system document hands to the tax adapter
    pub fn tax_system_id(&self) -> Option<&str> {
        self.get("tax_system_id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
    }

    /// `metadata.name` if declared, else the template name
    pub fn display_name(&self) -> &str {
        self.body
            .get("metadata")
            .and_then(|meta| meta.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(&self.name)
    }

    /// Deserialize a typed view of this template
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ConfigurationError> {
        serde_yaml::from_value(self.body.clone()).map_err(|source| ConfigurationError::Malformed {
            context: format!("{} template '{}'", self.kind, self.name),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_spec_from_bare_name() {
        let spec = TemplateSpec::from_value(TemplateKind::SalaryProgression, &yaml("conservative")).unwrap();
        assert_eq!(spec, TemplateSpec::Name("conservative".into()));
    }

    #[test]
    fn test_spec_with_inline_overrides() {
        let value = yaml("template: graduate\nmonthly_expenses:\n  food: 500\n");
        let spec = TemplateSpec::from_value(TemplateKind::ExpenseProfile, &value).unwrap();
        match spec {
            TemplateSpec::WithOverrides { template, overrides } => {
                assert_eq!(template, "graduate");
                assert_eq!(overrides.len(), 1);
                assert!(overrides.contains_key("monthly_expenses"));
            }
            other => panic!("unexpected spec {other:?}"),
        }
    }

    #[test]
    fn test_spec_without_template_name_is_an_error() {
        let value = yaml("monthly_expenses:\n  food: 500\n");
        let err = TemplateSpec::from_value(TemplateKind::ExpenseProfile, &value).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingTemplateName { .. }));
    }

    #[test]
    fn test_tax_system_id_must_be_non_empty() {
        let doc = TemplateDocument::new(TemplateKind::TaxSystem, "blank", yaml("tax_system_id: ''"));
        assert_eq!(doc.tax_system_id(), None);

        let doc = TemplateDocument::new(TemplateKind::TaxSystem, "uk", yaml("tax_system_id: uk_income_tax_ni"));
        assert_eq!(doc.tax_system_id(), Some("uk_income_tax_ni"));
    }

    #[test]
    fn test_serialized_name_matches_display() {
        let kinds = [
            TemplateKind::SalaryProgression,
            TemplateKind::HousingStrategy,
            TemplateKind::ExpenseProfile,
            TemplateKind::InvestmentStrategy,
            TemplateKind::LifeEvent,
            TemplateKind::TaxSystem,
        ];
        for kind in kinds {
            assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{kind}\""));
            let parsed: TemplateKind = serde_json::from_str(&format!("\"{}\"", kind.dir_name())).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_relative_dirs() {
        assert_eq!(TemplateKind::TaxSystem.relative_dir(), "tax_systems");
        assert_eq!(
            TemplateKind::HousingStrategy.relative_dir(),
            "templates/housing_strategies"
        );
    }
}
