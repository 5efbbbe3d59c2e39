//! University course timetabling as a constraint satisfaction problem.
//!
//! A [`data::Snapshot`] of courses, rooms, instructors and time slots is
//! expanded into variables by [`variables::VariableManager`], solved by
//! [`solver::ConstraintSolver`] (AC-3 followed by backtracking with forward
//! checking), scored by [`evaluator::Evaluator`] and checked by
//! [`validation::validate`] before [`scheduler::Scheduler`] commits it through
//! a [`store::PersistenceAdapter`].

pub mod data;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod scheduler;
pub mod server;
pub mod solver;
pub mod store;
pub mod validation;
pub mod variables;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{Scheduler, SchedulerConfig, TimetableReport};
