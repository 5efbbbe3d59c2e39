//! Arc consistency (AC-3) over the neighbor graph.

use std::collections::{HashSet, VecDeque};

use log::{debug, trace};

use super::SearchContext;
use super::domains::Domains;
use crate::error::Limit;
use crate::model::Problem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ac3Outcome {
    /// Every remaining value has support in every neighbor.
    Consistent { pruned: usize },
    /// The domain of `var` ran dry, so no timetable exists.
    Wipeout { var: usize },
}

/// Prunes `domains` to arc consistency. Limits are polled once per dequeued arc.
pub fn ac3(
    problem: &Problem,
    domains: &mut Domains,
    ctx: &mut SearchContext<'_>,
) -> Result<Ac3Outcome, Limit> {
    let mut queue = VecDeque::new();
    let mut queued = HashSet::new();
    for xi in 0..problem.variable_count() {
        for &xj in problem.graph.neighbors(xi) {
            queue.push_back((xi, xj));
            queued.insert((xi, xj));
        }
    }
    debug!("AC-3 starting with {} arcs", queue.len());

    let mut pruned = 0;
    while let Some((xi, xj)) = queue.pop_front() {
        queued.remove(&(xi, xj));
        ctx.poll()?;
        ctx.stats.ac3_revisions += 1;

        let removed = revise(problem, domains, ctx, xi, xj);
        if removed == 0 {
            continue;
        }
        pruned += removed;
        trace!("AC-3 removed {removed} values from {xi} against {xj}");
        if domains.size(xi) == 0 {
            ctx.stats.ac3_pruned += pruned;
            return Ok(Ac3Outcome::Wipeout { var: xi });
        }
        for &xk in problem.graph.neighbors(xi) {
            if xk != xj && queued.insert((xk, xi)) {
                queue.push_back((xk, xi));
            }
        }
    }

    ctx.stats.ac3_pruned += pruned;
    Ok(Ac3Outcome::Consistent { pruned })
}

/// Removes values of `xi` with no supporting value in `xj`. Returns how many went.
fn revise(
    problem: &Problem,
    domains: &mut Domains,
    ctx: &mut SearchContext<'_>,
    xi: usize,
    xj: usize,
) -> usize {
    let mut removed = 0;
    for k in 0..domains.candidate_count(xi) {
        if !domains.is_live(xi, k) {
            continue;
        }
        let value = domains.candidate(xi, k);
        let supported = domains
            .live_values(xj)
            .any(|other| ctx.check(problem, xi, value, xj, other));
        if !supported {
            domains.remove(xi, k);
            removed += 1;
        }
    }
    removed
}
