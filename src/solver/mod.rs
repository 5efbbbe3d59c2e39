//! Constraint solver: AC-3 preprocessing, then backtracking search under hard ceilings.

mod ac3;
mod domains;
mod search;

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

pub use ac3::{Ac3Outcome, ac3};
pub use domains::Domains;

use crate::data::Occupancy;
use crate::error::{FailureContext, Limit, SchedulerError, UnsatProof};
use crate::model::{Assignment, DomainValue, Problem};
use search::SearchEnd;

/// Whether `var_i = a` and `var_j = b` can hold at the same time.
///
/// Placements in different slots never clash. In the same slot, sharing a room
/// or a (non-null) instructor is only allowed for one first half plus one
/// second half.
pub fn consistent(problem: &Problem, i: usize, a: DomainValue, j: usize, b: DomainValue) -> bool {
    if a.slot != b.slot {
        return true;
    }
    let same_room = a.room == b.room;
    let same_instructor = match (
        problem.variables[i].instructor,
        problem.variables[j].instructor,
    ) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    };
    if !same_room && !same_instructor {
        return true;
    }
    halves_share(a.occupancy, b.occupancy)
}

fn halves_share(a: Occupancy, b: Occupancy) -> bool {
    match (a, b) {
        (Occupancy::FirstHalf, Occupancy::SecondHalf)
        | (Occupancy::SecondHalf, Occupancy::FirstHalf) => true,
        (Occupancy::FirstHalf, Occupancy::FirstHalf)
        | (Occupancy::SecondHalf, Occupancy::SecondHalf) => false,
        (Occupancy::Full, _) | (_, Occupancy::Full) => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueOrdering {
    /// Least-constraining value first.
    LeastConstraining,
    /// Candidate list order, no scoring.
    DomainOrder,
}

/// Solver configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverConfig {
    /// AC-3 only runs for at least this many variables.
    pub ac3_min_variables: usize,
    /// Ceiling on search nodes expanded.
    pub max_backtrack_calls: u64,
    /// Ceiling on binary constraint evaluations, AC-3 and search combined.
    pub max_consistency_checks: u64,
    /// Wall-clock budget in milliseconds.
    pub time_limit_ms: u64,
    /// Abort once the same variable has been emptied this many times in a row.
    pub max_consecutive_failures: usize,
    pub value_ordering: ValueOrdering,
    /// Above this many estimated checks, one LCV call falls back to domain order.
    pub lcv_work_limit: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            ac3_min_variables: 10,
            max_backtrack_calls: 1_000_000,
            max_consistency_checks: 200_000_000,
            time_limit_ms: 60_000,
            max_consecutive_failures: 5_000,
            value_ordering: ValueOrdering::LeastConstraining,
            lcv_work_limit: 2_000_000,
        }
    }
}

/// Where a solve ended up.
///
/// `Unsolved -> (Ac3Failed | Searching) -> (Solved | Exhausted | LimitExceeded)`.
/// A ceiling hit during AC-3 also ends in `LimitExceeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SolveStatus {
    Unsolved,
    Ac3Failed,
    Searching,
    Solved,
    Exhausted,
    LimitExceeded,
}

/// Counters gathered during one solve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    pub ac3_revisions: u64,
    pub ac3_pruned: usize,
    pub backtrack_calls: u64,
    pub backtracks: u64,
    pub consistency_checks: u64,
    pub wipeouts: u64,
    pub max_depth: usize,
    pub lcv_fallbacks: u64,
    pub elapsed_ms: u64,
}

/// Mutable state of one solve, threaded through AC-3 and the search.
pub struct SearchContext<'c> {
    config: &'c SolverConfig,
    started: Instant,
    budget: Duration,
    pub stats: SearchStats,
    depth: usize,
    last_failure: Option<usize>,
    consecutive_failures: usize,
}

impl<'c> SearchContext<'c> {
    pub fn new(config: &'c SolverConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
            budget: Duration::from_millis(config.time_limit_ms),
            stats: SearchStats::default(),
            depth: 0,
            last_failure: None,
            consecutive_failures: 0,
        }
    }

    /// Counted constraint check.
    pub fn check(&mut self, problem: &Problem, i: usize, a: DomainValue, j: usize, b: DomainValue) -> bool {
        self.stats.consistency_checks += 1;
        consistent(problem, i, a, j, b)
    }

    /// Fails with the first ceiling that has been reached.
    pub fn poll(&self) -> Result<(), Limit> {
        if self.stats.backtrack_calls > self.config.max_backtrack_calls {
            return Err(Limit::BacktrackCalls);
        }
        if self.stats.consistency_checks > self.config.max_consistency_checks {
            return Err(Limit::ConsistencyChecks);
        }
        if self.started.elapsed() > self.budget {
            return Err(Limit::TimeBudget);
        }
        Ok(())
    }

    /// Notes that forward checking emptied `var`.
    fn record_failure(&mut self, var: usize) -> Result<(), Limit> {
        self.stats.wipeouts += 1;
        if self.last_failure == Some(var) {
            self.consecutive_failures += 1;
        } else {
            self.last_failure = Some(var);
            self.consecutive_failures = 1;
        }
        if self.consecutive_failures > self.config.max_consecutive_failures {
            return Err(Limit::ConsecutiveFailures);
        }
        Ok(())
    }
}

/// Result of [`ConstraintSolver::solve`]. Only `Solved` carries an assignment.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub assignment: Option<Assignment>,
    pub stats: SearchStats,
    pub limit: Option<Limit>,
    pub failure: Option<FailureContext>,
}

impl SolveOutcome {
    pub fn is_solved(&self) -> bool {
        self.status == SolveStatus::Solved
    }

    /// Splits the outcome into the assignment or the matching error.
    pub fn into_result(self) -> Result<(Assignment, SearchStats), SchedulerError> {
        match (self.status, self.assignment) {
            (SolveStatus::Solved, Some(assignment)) => Ok((assignment, self.stats)),
            (SolveStatus::Ac3Failed, _) => Err(SchedulerError::Unsatisfiable {
                proof: UnsatProof::ArcConsistency,
                context: self.failure,
            }),
            (SolveStatus::Exhausted, _) => Err(SchedulerError::Unsatisfiable {
                proof: UnsatProof::ExhaustiveSearch,
                context: self.failure,
            }),
            (_, _) => Err(SchedulerError::LimitExceeded {
                limit: self.limit.unwrap_or(Limit::BacktrackCalls),
                context: self.failure,
            }),
        }
    }
}

/// One independent solver instance. Holds no state between solves.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSolver {
    config: SolverConfig,
}

impl ConstraintSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn solve(&self, problem: &Problem) -> SolveOutcome {
        let mut ctx = SearchContext::new(&self.config);
        let mut domains = Domains::new(problem.domains.clone());
        let mut status = SolveStatus::Unsolved;
        info!(
            "Solving {} variables ({} edges)",
            problem.variable_count(),
            problem.graph.edge_count()
        );

        if problem.variable_count() >= self.config.ac3_min_variables {
            let start = Instant::now();
            match ac3(problem, &mut domains, &mut ctx) {
                Ok(Ac3Outcome::Consistent { pruned }) => {
                    domains.commit();
                    info!("AC-3 pruned {pruned} values in {:.2?}", start.elapsed());
                }
                Ok(Ac3Outcome::Wipeout { var }) => {
                    error!("AC-3 emptied the domain of {}", problem.describe(var));
                    return finish(problem, &ctx, status, SolveStatus::Ac3Failed, None, None, Some(var));
                }
                Err(limit) => {
                    warn!("AC-3 stopped by the {limit} limit");
                    return finish(problem, &ctx, status, SolveStatus::LimitExceeded, None, Some(limit), None);
                }
            }
        } else {
            debug!(
                "Skipping AC-3 below {} variables",
                self.config.ac3_min_variables
            );
        }

        status = transition(status, SolveStatus::Searching);
        match search::backtrack(problem, &mut domains, &mut ctx) {
            SearchEnd::Solved(assignment) => {
                finish(problem, &ctx, status, SolveStatus::Solved, Some(assignment), None, None)
            }
            SearchEnd::Exhausted => {
                let failure = ctx.last_failure;
                finish(problem, &ctx, status, SolveStatus::Exhausted, None, None, failure)
            }
            SearchEnd::Aborted(limit) => {
                let failure = ctx.last_failure;
                finish(problem, &ctx, status, SolveStatus::LimitExceeded, None, Some(limit), failure)
            }
        }
    }
}

fn transition(from: SolveStatus, to: SolveStatus) -> SolveStatus {
    debug!("Solver state {from:?} -> {to:?}");
    to
}

fn finish(
    problem: &Problem,
    ctx: &SearchContext<'_>,
    from: SolveStatus,
    to: SolveStatus,
    assignment: Option<Assignment>,
    limit: Option<Limit>,
    failed_var: Option<usize>,
) -> SolveOutcome {
    let status = transition(from, to);
    let mut stats = ctx.stats.clone();
    stats.elapsed_ms = ctx.started.elapsed().as_millis() as u64;
    let failure = failed_var.map(|var| failure_context(problem, var, ctx.depth));
    match status {
        SolveStatus::Solved => info!(
            "Solved in {} ms: {} search nodes, {} backtracks, {} checks",
            stats.elapsed_ms, stats.backtrack_calls, stats.backtracks, stats.consistency_checks
        ),
        _ => error!(
            "Solve ended {status:?} after {} ms, {} search nodes, {} checks{}",
            stats.elapsed_ms,
            stats.backtrack_calls,
            stats.consistency_checks,
            failure
                .as_ref()
                .map(|f| format!("; bottleneck {f}"))
                .unwrap_or_default()
        ),
    }
    SolveOutcome {
        status,
        assignment,
        stats,
        limit,
        failure,
    }
}

fn failure_context(problem: &Problem, var: usize, depth: usize) -> FailureContext {
    let variable = &problem.variables[var];
    let course = &problem.courses[variable.course.index()];
    FailureContext {
        variable: var,
        course_id: course.id,
        course_name: course.name.clone(),
        component: variable.component,
        instructor_id: variable
            .instructor
            .map(|idx| problem.instructors[idx.index()].id),
        depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ComponentType;
    use crate::model::{
        ConstraintGraph, CourseIdx, CourseInfo, InstructorIdx, InstructorInfo, RequiredOccupancy,
        RoomIdx, RoomInfo, SlotIdx, Variable,
    };

    fn variable(component: ComponentType, instructor: Option<usize>) -> Variable {
        Variable {
            course: CourseIdx(0),
            component,
            group_no: 1,
            section_no: 0,
            instructor: instructor.map(InstructorIdx),
            occupancy: RequiredOccupancy::for_component(component),
            course_name: "Physics".into(),
            capacity: 30,
            demand: 0,
        }
    }

    /// Every variable may use every room and slot; all pairs are neighbors.
    fn problem(variables: Vec<Variable>, rooms: usize, slots: usize) -> Problem {
        let n = variables.len();
        let domains = variables
            .iter()
            .map(|v| {
                let mut domain = Vec::new();
                for room in 0..rooms {
                    for slot in 0..slots {
                        for occupancy in v.occupancy.placements() {
                            domain.push(DomainValue::new(RoomIdx(room), SlotIdx(slot), *occupancy));
                        }
                    }
                }
                domain
            })
            .collect();
        let adjacency = (0..n)
            .map(|i| (0..n).filter(|j| *j != i).collect())
            .collect();
        Problem {
            courses: vec![CourseInfo { id: 1, name: "Physics".into() }],
            rooms: (0..rooms)
                .map(|r| RoomInfo { id: r as u32 })
                .collect(),
            instructors: vec![
                InstructorInfo { id: 10, name: "Dr. Nour".into() },
                InstructorInfo { id: 11, name: "Eng. Omar".into() },
            ],
            time_slots: Vec::new(),
            demands: Vec::new(),
            variables,
            domains,
            graph: ConstraintGraph::from_adjacency(adjacency),
        }
    }

    fn value(room: usize, slot: usize, occupancy: Occupancy) -> DomainValue {
        DomainValue::new(RoomIdx(room), SlotIdx(slot), occupancy)
    }

    fn assert_pairwise_consistent(problem: &Problem, assignment: &Assignment) {
        for (i, a) in assignment.iter() {
            for (j, b) in assignment.iter() {
                if i != j {
                    assert!(consistent(problem, i, a, j, b), "{i}={a:?} clashes with {j}={b:?}");
                }
            }
        }
    }

    #[test]
    fn consistency_rules() {
        let p = problem(
            vec![
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Tutorial, None),
                variable(ComponentType::Tutorial, None),
            ],
            2,
            2,
        );
        use Occupancy::*;
        // different slots never clash
        assert!(consistent(&p, 0, value(0, 0, Full), 1, value(0, 1, Full)));
        // same room, same slot, full
        assert!(!consistent(&p, 0, value(0, 0, Full), 2, value(0, 0, FirstHalf)));
        // shared instructor across rooms
        assert!(!consistent(&p, 0, value(0, 0, Full), 1, value(1, 0, Full)));
        // halves share a room
        assert!(consistent(&p, 2, value(0, 0, FirstHalf), 3, value(0, 0, SecondHalf)));
        assert!(!consistent(&p, 2, value(0, 0, FirstHalf), 3, value(0, 0, FirstHalf)));
        // null instructors never match each other
        assert!(consistent(&p, 2, value(0, 0, FirstHalf), 3, value(1, 0, FirstHalf)));
    }

    #[test]
    fn solves_and_respects_constraints() {
        let p = problem(
            vec![
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lab, Some(1)),
                variable(ComponentType::Tutorial, Some(1)),
                variable(ComponentType::Tutorial, None),
            ],
            2,
            2,
        );
        let outcome = ConstraintSolver::default().solve(&p);
        assert_eq!(outcome.status, SolveStatus::Solved);
        let assignment = outcome.assignment.unwrap();
        assert!(assignment.is_complete());
        assert_pairwise_consistent(&p, &assignment);
    }

    #[test]
    fn ac3_wipeout_skips_search() {
        let p = problem(
            vec![
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(0)),
            ],
            2,
            1,
        );
        let config = SolverConfig {
            ac3_min_variables: 0,
            ..SolverConfig::default()
        };
        let outcome = ConstraintSolver::new(config).solve(&p);
        assert_eq!(outcome.status, SolveStatus::Ac3Failed);
        assert_eq!(outcome.stats.backtrack_calls, 0);
        assert!(outcome.failure.is_some());
        assert!(matches!(
            outcome.into_result(),
            Err(SchedulerError::Unsatisfiable { proof: UnsatProof::ArcConsistency, .. })
        ));
    }

    #[test]
    fn exhausted_search_is_unsatisfiable() {
        let p = problem(
            vec![
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(0)),
            ],
            3,
            2,
        );
        let outcome = ConstraintSolver::default().solve(&p);
        assert_eq!(outcome.status, SolveStatus::Exhausted);
        assert!(outcome.stats.backtrack_calls > 0);
        assert!(matches!(
            outcome.into_result(),
            Err(SchedulerError::Unsatisfiable { proof: UnsatProof::ExhaustiveSearch, .. })
        ));
    }

    #[test]
    fn backtrack_ceiling_stops_search() {
        let p = problem(
            vec![
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(0)),
            ],
            3,
            2,
        );
        let config = SolverConfig {
            max_backtrack_calls: 1,
            ..SolverConfig::default()
        };
        let outcome = ConstraintSolver::new(config).solve(&p);
        assert_eq!(outcome.status, SolveStatus::LimitExceeded);
        assert_eq!(outcome.limit, Some(Limit::BacktrackCalls));
        assert!(outcome.assignment.is_none());
    }

    fn four_lectures() -> Problem {
        problem(
            vec![
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(1)),
                variable(ComponentType::Lecture, None),
                variable(ComponentType::Lecture, None),
            ],
            2,
            4,
        )
    }

    #[test]
    fn check_ceiling_stops_search() {
        // ordering the first variable's values alone costs far more than 10 checks
        let config = SolverConfig {
            max_consistency_checks: 10,
            ..SolverConfig::default()
        };
        let outcome = ConstraintSolver::new(config).solve(&four_lectures());
        assert_eq!(outcome.status, SolveStatus::LimitExceeded);
        assert_eq!(outcome.limit, Some(Limit::ConsistencyChecks));
        assert!(outcome.stats.backtrack_calls > 0);
        assert!(matches!(
            outcome.into_result(),
            Err(SchedulerError::LimitExceeded { limit: Limit::ConsistencyChecks, .. })
        ));
    }

    #[test]
    fn check_ceiling_stops_ac3() {
        let config = SolverConfig {
            ac3_min_variables: 0,
            max_consistency_checks: 1,
            ..SolverConfig::default()
        };
        let outcome = ConstraintSolver::new(config).solve(&four_lectures());
        assert_eq!(outcome.status, SolveStatus::LimitExceeded);
        assert_eq!(outcome.limit, Some(Limit::ConsistencyChecks));
        assert_eq!(outcome.stats.backtrack_calls, 0);
        assert!(outcome.assignment.is_none());
    }

    #[test]
    fn time_budget_stops_search() {
        let config = SolverConfig {
            time_limit_ms: 0,
            ..SolverConfig::default()
        };
        let outcome = ConstraintSolver::new(config).solve(&four_lectures());
        assert_eq!(outcome.status, SolveStatus::LimitExceeded);
        assert_eq!(outcome.limit, Some(Limit::TimeBudget));
        assert!(outcome.assignment.is_none());
    }

    #[test]
    fn consecutive_failures_name_the_bottleneck() {
        let p = problem(
            vec![
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(0)),
            ],
            3,
            2,
        );
        let config = SolverConfig {
            max_consecutive_failures: 1,
            ..SolverConfig::default()
        };
        let outcome = ConstraintSolver::new(config).solve(&p);
        assert_eq!(outcome.limit, Some(Limit::ConsecutiveFailures));
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.component, ComponentType::Lecture);
        assert_eq!(failure.instructor_id, Some(10));
    }

    #[test]
    fn lecture_and_tutorial_split_the_only_room() {
        // one room: the lecture fills a whole slot, so the tutorial takes the other
        let p = problem(
            vec![
                variable(ComponentType::Tutorial, None),
                variable(ComponentType::Lecture, None),
            ],
            1,
            2,
        );
        let config = SolverConfig {
            ac3_min_variables: usize::MAX,
            ..SolverConfig::default()
        };
        let outcome = ConstraintSolver::new(config).solve(&p);
        let assignment = outcome.assignment.unwrap();
        assert_pairwise_consistent(&p, &assignment);
        assert_ne!(assignment.get(0).unwrap().slot, assignment.get(1).unwrap().slot);
    }

    #[test]
    fn domain_order_gives_same_safety() {
        let p = problem(
            (0..4).map(|_| variable(ComponentType::Tutorial, None)).collect(),
            1,
            2,
        );
        let config = SolverConfig {
            value_ordering: ValueOrdering::DomainOrder,
            ..SolverConfig::default()
        };
        let outcome = ConstraintSolver::new(config).solve(&p);
        let assignment = outcome.assignment.unwrap();
        assert_pairwise_consistent(&p, &assignment);
    }

    #[test]
    fn ac3_is_monotonic_and_idempotent() {
        let mut p = problem(
            vec![
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lecture, Some(0)),
                variable(ComponentType::Lab, Some(1)),
            ],
            2,
            2,
        );
        p.domains[1] = vec![value(0, 0, Occupancy::Full)];
        let config = SolverConfig::default();
        let mut ctx = SearchContext::new(&config);
        let mut domains = Domains::new(p.domains.clone());
        let before = domains.current();

        let first = ac3(&p, &mut domains, &mut ctx).unwrap();
        assert_eq!(first, Ac3Outcome::Consistent { pruned: 3 });
        let once = domains.current();
        for (var, values) in once.iter().enumerate() {
            assert!(values.iter().all(|v| before[var].contains(v)));
        }
        assert_eq!(once[0], vec![value(0, 1, Occupancy::Full), value(1, 1, Occupancy::Full)]);
        assert_eq!(once[2].len(), 3);

        let second = ac3(&p, &mut domains, &mut ctx).unwrap();
        assert_eq!(second, Ac3Outcome::Consistent { pruned: 0 });
        assert_eq!(domains.current(), once);
    }
}
