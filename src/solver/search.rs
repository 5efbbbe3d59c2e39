//! Backtracking search with MRV, LCV and forward checking.
//!
//! The recursion is kept on an explicit stack of frames. Each frame remembers
//! the trail checkpoint taken before its variable was tried, so moving to the
//! next value (or popping the frame) restores every domain exactly.

use std::cmp::Reverse;

use log::trace;

use super::domains::Domains;
use super::{SearchContext, ValueOrdering};
use crate::error::Limit;
use crate::model::{Assignment, DomainValue, Problem};

pub(crate) enum SearchEnd {
    Solved(Assignment),
    Exhausted,
    Aborted(Limit),
}

struct Frame {
    var: usize,
    /// Candidate positions in the order they will be tried.
    values: Vec<usize>,
    next: usize,
    checkpoint: usize,
}

pub(crate) fn backtrack(
    problem: &Problem,
    domains: &mut Domains,
    ctx: &mut SearchContext<'_>,
) -> SearchEnd {
    let mut assignment = Assignment::new(problem.variable_count());
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        if assignment.is_complete() {
            return SearchEnd::Solved(assignment);
        }
        ctx.stats.backtrack_calls += 1;
        if let Err(limit) = ctx.poll() {
            return SearchEnd::Aborted(limit);
        }

        let Some(var) = select_variable(problem, domains, &assignment) else {
            return SearchEnd::Solved(assignment);
        };
        let values = order_values(problem, domains, &assignment, var, ctx);
        stack.push(Frame {
            var,
            values,
            next: 0,
            checkpoint: domains.checkpoint(),
        });
        ctx.depth = stack.len();
        ctx.stats.max_depth = ctx.stats.max_depth.max(stack.len());

        // advance to the next value that survives forward checking, popping
        // exhausted frames on the way
        loop {
            let Some(frame) = stack.last_mut() else {
                return SearchEnd::Exhausted;
            };
            domains.restore(frame.checkpoint);
            assignment.unassign(frame.var);

            let Some(&k) = frame.values.get(frame.next) else {
                stack.pop();
                ctx.depth = stack.len();
                ctx.stats.backtracks += 1;
                continue;
            };
            frame.next += 1;
            let var = frame.var;
            let value = domains.candidate(var, k);

            if !consistent_with_assigned(problem, &assignment, ctx, var, value) {
                continue;
            }
            assignment.assign(var, value);
            trace!("depth {}: {} -> {:?}", stack.len(), var, value);

            match forward_check(problem, domains, &assignment, ctx, var, value) {
                Ok(()) => break,
                Err(wiped) => {
                    if let Err(limit) = ctx.record_failure(wiped) {
                        return SearchEnd::Aborted(limit);
                    }
                }
            }
        }
    }
}

/// Smallest live domain first; ties go to the most unassigned neighbors, then the lowest index.
fn select_variable(problem: &Problem, domains: &Domains, assignment: &Assignment) -> Option<usize> {
    let unassigned: Vec<usize> = (0..problem.variable_count())
        .filter(|v| !assignment.is_assigned(*v))
        .collect();
    let smallest = unassigned.iter().map(|v| domains.size(*v)).min()?;
    unassigned
        .into_iter()
        .filter(|v| domains.size(*v) == smallest)
        .min_by_key(|v| (Reverse(unassigned_degree(problem, assignment, *v)), *v))
}

fn unassigned_degree(problem: &Problem, assignment: &Assignment, var: usize) -> usize {
    problem
        .graph
        .neighbors(var)
        .iter()
        .filter(|n| !assignment.is_assigned(**n))
        .count()
}

/// Live candidates of `var`, least constraining first when enabled.
fn order_values(
    problem: &Problem,
    domains: &Domains,
    assignment: &Assignment,
    var: usize,
    ctx: &mut SearchContext<'_>,
) -> Vec<usize> {
    let live: Vec<usize> = domains.live_indices(var).collect();
    if ctx.config.value_ordering == ValueOrdering::DomainOrder || live.len() < 2 {
        return live;
    }

    let open: Vec<usize> = problem
        .graph
        .neighbors(var)
        .iter()
        .copied()
        .filter(|n| !assignment.is_assigned(*n))
        .collect();
    let work = live.len() as u64 * open.iter().map(|n| domains.size(*n) as u64).sum::<u64>();
    if work > ctx.config.lcv_work_limit {
        ctx.stats.lcv_fallbacks += 1;
        return live;
    }

    let mut scored: Vec<(usize, usize)> = live
        .into_iter()
        .map(|k| {
            let value = domains.candidate(var, k);
            let eliminated: usize = open
                .iter()
                .map(|&n| {
                    domains
                        .live_values(n)
                        .filter(|other| !ctx.check(problem, var, value, n, *other))
                        .count()
                })
                .sum();
            (eliminated, k)
        })
        .collect();
    // stable, so equal scores keep domain order
    scored.sort_by_key(|(eliminated, _)| *eliminated);
    scored.into_iter().map(|(_, k)| k).collect()
}

fn consistent_with_assigned(
    problem: &Problem,
    assignment: &Assignment,
    ctx: &mut SearchContext<'_>,
    var: usize,
    value: DomainValue,
) -> bool {
    problem.graph.neighbors(var).iter().all(|&n| match assignment.get(n) {
        Some(other) => ctx.check(problem, var, value, n, other),
        None => true,
    })
}

/// Prunes unassigned neighbors against `var = value`. Returns the first neighbor left empty.
fn forward_check(
    problem: &Problem,
    domains: &mut Domains,
    assignment: &Assignment,
    ctx: &mut SearchContext<'_>,
    var: usize,
    value: DomainValue,
) -> Result<(), usize> {
    for &n in problem.graph.neighbors(var) {
        if assignment.is_assigned(n) {
            continue;
        }
        for k in 0..domains.candidate_count(n) {
            if domains.is_live(n, k) && !ctx.check(problem, var, value, n, domains.candidate(n, k)) {
                domains.remove(n, k);
            }
        }
        if domains.size(n) == 0 {
            return Err(n);
        }
    }
    Ok(())
}
