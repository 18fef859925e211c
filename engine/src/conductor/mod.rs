//! Conductor System
//!
//! Orchestrates one research run: task decomposition, capability dispatch,
//! context accumulation and the final synthesis.

pub mod context;
pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod types;

pub use context::RunContext;
pub use executor::{Dispatched, Dispatcher};
pub use orchestrator::Orchestrator;
pub use planner::TaskDecomposer;
pub use types::{DispatchError, Query, ResearchError, RunReport, SubTask, SubTaskResult};
