//! Presenteeism Engine library crate.
//!
//! This crate estimates the yearly cost of presenteeism for a company,
//! either from its sector absenteeism rate (`engine::calculate_macro`)
//! or from an anonymous employee survey (`survey::aggregate` followed by
//! `engine::calculate_micro`).  Survey-based estimates can be memoized
//! per campaign through `cache::ResultCache`.  The crate performs no
//! I/O besides optional settings loading; the host application fetches
//! inputs and persists results.

pub mod cache;
pub mod engine;
pub mod error;
pub mod models;
pub mod settings;
pub mod survey;

pub use cache::{content_hash, CachedCalculation, ResultCache};
pub use engine::{calculate_macro, calculate_micro, calculate_micro_batch, compare_methods};
pub use error::{EngineError, Result};
pub use models::{AggregateStatistics, CalculationResult, CompanyFinancials, ResponseRecord};
pub use settings::{EngineSettings, MacroCoefficients, MicroCoefficients};
pub use survey::aggregate;
