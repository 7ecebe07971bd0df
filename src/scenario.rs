//! Scenario runner for single and batch projections
//!
//! Holds one template resolver (and so one template cache) shared by every
//! scenario it runs. Batch runs fan out across threads with rayon; each
//! scenario gets its own projection state and a failure in one is recorded
//! against its id without touching the others.

use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use crate::config::{ResolvedScenarioConfig, ScenarioResolver, Validator};
use crate::error::{ConfigurationError, PlannerError};
use crate::projection::{ProjectionConfig, ProjectionEngine, ScenarioProjection};
use crate::tax::{StandardTaxAdapter, TaxAdapter};
use crate::templates::{FsTemplateStore, TemplateResolver, TemplateSource};

/// Result of one scenario in a batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub scenario_id: String,
    pub result: Result<ScenarioProjection, PlannerError>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Resolves, validates and projects scenarios
///
/// # Example
/// ```ignore
/// let runner = ScenarioRunner::from_config_root("config");
/// let projection = runner.run("uk_to_seattle")?;
/// println!("{:?}", projection.summary());
/// ```
pub struct ScenarioRunner {
    templates: TemplateResolver,
    engine: ProjectionEngine,
    validator: Validator,
}

impl ScenarioRunner {
    /// Runner reading from `source` with the standard tax adapter
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        let tax: Arc<dyn TaxAdapter> = Arc::new(StandardTaxAdapter::new());
        Self {
            templates: TemplateResolver::new(source),
            validator: Validator::for_adapter(tax.as_ref()),
            engine: ProjectionEngine::new(tax, ProjectionConfig::default()),
        }
    }

    /// Runner reading YAML documents under `root`
    pub fn from_config_root(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FsTemplateStore::new(root)))
    }

    /// Swap the tax adapter; the validator then accepts only its systems
    pub fn with_tax_adapter(self, tax: Arc<dyn TaxAdapter>) -> Self {
        let config = self.engine.config().clone();
        Self {
            validator: Validator::for_adapter(tax.as_ref()),
            engine: ProjectionEngine::new(tax, config),
            templates: self.templates,
        }
    }

    pub fn with_projection_config(self, config: ProjectionConfig) -> Self {
        let Self {
            templates,
            engine,
            validator,
        } = self;
        Self {
            engine: ProjectionEngine::new(engine.tax_adapter(), config),
            templates,
            validator,
        }
    }

    pub fn templates(&self) -> &TemplateResolver {
        &self.templates
    }

    /// Resolve and validate a scenario without projecting it
    pub fn resolve(&self, scenario_id: &str) -> Result<ResolvedScenarioConfig, PlannerError> {
        let config = ScenarioResolver::new(&self.templates).load(scenario_id)?;
        self.validator.validate(&config)?;
        Ok(config)
    }

    pub fn run(&self, scenario_id: &str) -> Result<ScenarioProjection, PlannerError> {
        let config = self.resolve(scenario_id)?;
        self.engine.project(&config)
    }

    /// Validate and project an already-resolved scenario
    pub fn run_config(&self, config: &ResolvedScenarioConfig) -> Result<ScenarioProjection, PlannerError> {
        self.validator.validate(config)?;
        self.engine.project(config)
    }

    /// Run scenarios in parallel; outcomes keep the order of `scenario_ids`
    pub fn run_batch<S: AsRef<str> + Sync>(&self, scenario_ids: &[S]) -> Vec<BatchOutcome> {
        scenario_ids
            .par_iter()
            .map(|id| {
                let id = id.as_ref();
                let result = self.run(id);
                if let Err(err) = &result {
                    log::warn!("Scenario '{id}' failed: {err}");
                }
                BatchOutcome {
                    scenario_id: id.to_string(),
                    result,
                }
            })
            .collect()
    }

    /// Run every scenario the template source lists
    pub fn run_all(&self) -> Result<Vec<BatchOutcome>, ConfigurationError> {
        let ids = self.templates.source().list_scenarios()?;
        log::info!("Running {} scenarios", ids.len());
        Ok(self.run_batch(&ids))
    }
}
