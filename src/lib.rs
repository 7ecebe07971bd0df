//! Life Planner - template-driven multi-year personal financial projections
//!
//! This library provides:
//! - Inheritable YAML templates with deep merge and a per-run cache
//! - Single- and multi-phase scenario resolution with aggregated validation
//! - A year-by-year projection engine covering income, tax, expenses,
//!   housing, investments and net worth
//! - A pluggable tax adapter boundary
//! - Parallel batch runs with per-scenario failure isolation

pub mod config;
pub mod error;
pub mod projection;
pub mod scenario;
pub mod tax;
pub mod templates;

// Re-export commonly used types
pub use config::{PhaseConfig, ResolvedScenarioConfig, ScenarioResolver, Validator};
pub use error::{ComputationError, ConfigurationError, CycleError, PlannerError, ValidationError};
pub use projection::{ProjectionConfig, ProjectionEngine, ScenarioProjection, ScenarioSummary, YearlyDataPoint};
pub use scenario::{BatchOutcome, ScenarioRunner};
pub use tax::{StandardTaxAdapter, TaxAdapter, TaxResult};
pub use templates::{FsTemplateStore, TemplateDocument, TemplateKind, TemplateResolver, TemplateSpec};
