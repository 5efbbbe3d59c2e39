use std::fmt;

use thiserror::Error;

use crate::data::{ComponentType, CourseId, InstructorId};
use crate::validation::Conflict;

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Problems with the snapshot that make solving pointless. Reported before search starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("no variables found, check that required courses exist")]
    NoVariables,
    #[error("no time slots found, so no domains can be built")]
    NoTimeSlots,
    #[error("required course references unknown course {0}")]
    UnknownCourse(CourseId),
    #[error("required course {0} has no positive capacity")]
    InvalidCapacity(CourseId),
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },
    #[error("{count} variables have empty domains, check that suitable rooms exist for every component type (first: {first})")]
    EmptyDomains { count: usize, first: String },
}

/// Where the solver gave up, for the caller deciding whether to relax inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext {
    pub variable: usize,
    pub course_id: CourseId,
    pub course_name: String,
    pub component: ComponentType,
    pub instructor_id: Option<InstructorId>,
    pub depth: usize,
}

impl fmt::Display for FailureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "variable {} ({} {}, {}) at depth {}",
            self.variable, self.course_id, self.course_name, self.component, self.depth
        )?;
        match self.instructor_id {
            Some(id) => write!(f, ", instructor {id}"),
            None => write!(f, ", no instructor"),
        }
    }
}

/// Which search ceiling stopped the solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    BacktrackCalls,
    ConsistencyChecks,
    TimeBudget,
    ConsecutiveFailures,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Limit::BacktrackCalls => "backtrack-call",
            Limit::ConsistencyChecks => "consistency-check",
            Limit::TimeBudget => "time",
            Limit::ConsecutiveFailures => "consecutive-failure",
        };
        f.write_str(name)
    }
}

/// How unsatisfiability was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsatProof {
    ArcConsistency,
    ExhaustiveSearch,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("row {row} rejected: {reason}")]
    RowRejected { row: usize, reason: String },
    #[error("snapshot could not be read: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("IO error, more details: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid input: {0}")]
    Input(#[from] InputError),
    #[error("no valid timetable exists ({proof:?}){}", fmt_context(.context))]
    Unsatisfiable {
        proof: UnsatProof,
        context: Option<FailureContext>,
    },
    #[error("no solution found: {limit} limit reached{}", fmt_context(.context))]
    LimitExceeded {
        limit: Limit,
        context: Option<FailureContext>,
    },
    #[error("{} conflicts found before commit, first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    ConflictOnSave(Vec<Conflict>),
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),
}

fn fmt_context(context: &Option<FailureContext>) -> String {
    match context {
        Some(context) => format!(", likely bottleneck: {context}"),
        None => String::new(),
    }
}
