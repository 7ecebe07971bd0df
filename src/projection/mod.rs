//! Generic year-by-year financial projection

mod engine;
pub mod housing;
pub mod lookup;
pub mod profiles;
mod records;
mod state;

pub use engine::{ProjectionConfig, ProjectionEngine};
pub use housing::{HousingStatus, Mortgage};
pub use lookup::{YearKey, YearTable};
pub use records::{
    ExpenseBreakdown, IncomeBreakdown, InvestmentBreakdown, NetWorthBreakdown, ScenarioProjection,
    ScenarioSummary, TaxBreakdown, YearlyDataPoint,
};
pub use state::ProjectionState;
