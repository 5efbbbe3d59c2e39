//! End-to-end timetable generation against a persistence adapter.

use std::collections::BTreeMap;
use std::time::Instant;

use itertools::Itertools;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::data::{ScheduleEntry, Term, UnmetSoftConstraint};
use crate::error::{SchedulerError, SchedulerResult};
use crate::evaluator::{Evaluator, EvaluatorConfig, ScoreBreakdown};
use crate::model::{Assignment, Problem};
use crate::solver::{ConstraintSolver, SearchStats, SolverConfig};
use crate::store::PersistenceAdapter;
use crate::validation::validate;
use crate::variables::VariableManager;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub solver: SolverConfig,
    pub evaluator: EvaluatorConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveStatistics {
    pub total_time_ms: u64,
    pub variables_count: usize,
    pub assignments_count: usize,
    pub edges_count: usize,
    pub search: SearchStats,
}

/// The final output of a timetable run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableReport {
    pub entries: Vec<ScheduleEntry>,
    pub score: ScoreBreakdown,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
    pub statistics: SolveStatistics,
}

pub struct Scheduler<S> {
    store: S,
    config: SchedulerConfig,
}

impl<S: PersistenceAdapter> Scheduler<S> {
    pub fn new(store: S, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Snapshot, variables, solve, score, validate, then replace the solved terms.
    pub fn run(&mut self) -> SchedulerResult<TimetableReport> {
        info!("=== Starting timetable generation ===");
        let started = Instant::now();
        let result = self.generate(started);
        match &result {
            Ok(report) => info!(
                "=== Timetable generation complete in {} ms ===",
                report.statistics.total_time_ms
            ),
            Err(e) => error!("Timetable generation failed: {e}"),
        }
        result
    }

    fn generate(&mut self, started: Instant) -> SchedulerResult<TimetableReport> {
        let snapshot = self.store.snapshot()?;
        let problem = VariableManager::build(&snapshot)?;
        info!("Input validation passed");

        let solver = ConstraintSolver::new(self.config.solver.clone());
        let (assignment, search) = solver.solve(&problem).into_result()?;
        log_solution(&problem, &assignment);

        let (score, unmet_soft_constraints) =
            Evaluator::new(self.config.evaluator.clone()).evaluate(&problem, &assignment);

        let conflicts = validate(&problem, &assignment);
        if !conflicts.is_empty() {
            for conflict in &conflicts {
                error!("Conflict before save: {conflict}");
            }
            return Err(SchedulerError::ConflictOnSave(conflicts));
        }

        let entries = to_entries(&problem, &assignment);
        let save_started = Instant::now();
        let terms: Vec<Term> = problem.demands.iter().map(|d| d.term).unique().collect();
        self.store.replace(&terms, &entries)?;
        info!("Saved to store in {:.2?}", save_started.elapsed());

        Ok(TimetableReport {
            statistics: SolveStatistics {
                total_time_ms: started.elapsed().as_millis() as u64,
                variables_count: problem.variable_count(),
                assignments_count: assignment.len(),
                edges_count: problem.graph.edge_count(),
                search,
            },
            entries,
            score,
            unmet_soft_constraints,
        })
    }
}

/// One row per solved variable, in variable order.
pub fn to_entries(problem: &Problem, assignment: &Assignment) -> Vec<ScheduleEntry> {
    assignment
        .iter()
        .map(|(var, value)| {
            let variable = &problem.variables[var];
            let demand = &problem.demands[variable.demand];
            ScheduleEntry {
                level: demand.level,
                term: demand.term,
                faculty: demand.faculty,
                course_id: problem.courses[variable.course.index()].id,
                component_type: variable.component,
                occupancy: value.occupancy,
                instructor_id: variable
                    .instructor
                    .map(|idx| problem.instructors[idx.index()].id),
                room_id: problem.rooms[value.room.index()].id,
                time_slot_id: problem.time_slots[value.slot.index()].id,
                group_no: variable.group_no,
                section_no: variable.section_no,
            }
        })
        .collect()
}

fn log_solution(problem: &Problem, assignment: &Assignment) {
    info!(
        "Assigned {} out of {} variables",
        assignment.len(),
        problem.variable_count()
    );
    let by_type: BTreeMap<_, usize> = assignment
        .iter()
        .map(|(var, _)| problem.variables[var].component)
        .fold(BTreeMap::new(), |mut acc, component| {
            *acc.entry(component).or_default() += 1;
            acc
        });
    for (component, count) in by_type {
        info!("  - {component}: {count} assignments");
    }
    for (var, value) in assignment.iter().take(5) {
        let slot = &problem.time_slots[value.slot.index()];
        debug!(
            "  {} -> room {}, {:?} {}-{} ({})",
            problem.describe(var),
            problem.rooms[value.room.index()].id,
            slot.day,
            slot.start,
            slot.end,
            value.occupancy
        );
    }
}
