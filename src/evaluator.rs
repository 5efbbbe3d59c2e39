//! Soft-constraint scoring of a finished timetable.
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Time preference | bonus per placement starting inside the preferred band, penalty otherwise |
//! | Instructor balance | `50 - 10 * stddev(placements per instructor)`, floored at 0 |
//! | Room utilization | `placements / distinct (room, slot) pairs * weight` |
//! | Slot efficiency | bonus per first/second half pair sharing a room and slot, penalty per lone half |
//!
//! All four are integers and are added up into the total. The computation uses
//! no clock and no randomness, and sums in integers, so re-scoring an unchanged
//! assignment always gives the same number.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::data::{ClockTime, Occupancy, UnmetSoftConstraint};
use crate::model::{Assignment, Problem, RoomIdx, SlotIdx};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluatorConfig {
    /// Earliest preferred start, inclusive.
    pub preferred_from: ClockTime,
    /// Latest preferred start, inclusive.
    pub preferred_until: ClockTime,
    pub time_bonus: i64,
    pub time_penalty: i64,
    pub balance_base: i64,
    pub balance_per_stddev: i64,
    pub utilization_weight: i64,
    pub pair_bonus: i64,
    pub lone_half_penalty: i64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            preferred_from: ClockTime::new(9, 0),
            preferred_until: ClockTime::new(14, 15),
            time_bonus: 10,
            time_penalty: 10,
            balance_base: 50,
            balance_per_stddev: 10,
            utilization_weight: 10,
            pair_bonus: 15,
            lone_half_penalty: 5,
        }
    }
}

/// Per-metric scores and their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub time_preference: i64,
    pub instructor_balance: i64,
    pub room_utilization: i64,
    pub slot_efficiency: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, problem: &Problem, assignment: &Assignment) -> ScoreBreakdown {
        self.evaluate(problem, assignment).0
    }

    /// Scores the assignment and lists the soft constraints it misses.
    pub fn evaluate(
        &self,
        problem: &Problem,
        assignment: &Assignment,
    ) -> (ScoreBreakdown, Vec<UnmetSoftConstraint>) {
        let mut unmet = Vec::new();
        let time_preference = self.time_preference(problem, assignment, &mut unmet);
        let instructor_balance = self.instructor_balance(problem, assignment);
        let room_utilization = self.room_utilization(assignment);
        let slot_efficiency = self.slot_efficiency(problem, assignment, &mut unmet);

        let score = ScoreBreakdown {
            time_preference,
            instructor_balance,
            room_utilization,
            slot_efficiency,
            total: time_preference + instructor_balance + room_utilization + slot_efficiency,
        };
        info!(
            "Schedule quality score: {} (time {}, balance {}, utilization {}, pairing {})",
            score.total, time_preference, instructor_balance, room_utilization, slot_efficiency
        );
        debug!("{} soft constraints unmet", unmet.len());
        (score, unmet)
    }

    fn time_preference(
        &self,
        problem: &Problem,
        assignment: &Assignment,
        unmet: &mut Vec<UnmetSoftConstraint>,
    ) -> i64 {
        let mut score = 0;
        for (var, value) in assignment.iter() {
            let slot = &problem.time_slots[value.slot.index()];
            if slot.start >= self.config.preferred_from && slot.start <= self.config.preferred_until {
                score += self.config.time_bonus;
            } else {
                score -= self.config.time_penalty;
                unmet.push(UnmetSoftConstraint {
                    constraint_type: "Preferred Time Band".to_string(),
                    description: format!(
                        "{} starts at {} on {:?}, outside {}-{}",
                        problem.describe(var),
                        slot.start,
                        slot.day,
                        self.config.preferred_from,
                        self.config.preferred_until
                    ),
                });
            }
        }
        score
    }

    fn instructor_balance(&self, problem: &Problem, assignment: &Assignment) -> i64 {
        let counts = assignment
            .iter()
            .filter_map(|(var, _)| problem.variables[var].instructor)
            .counts();
        let n = counts.len() as u64;
        if n == 0 {
            return self.config.balance_base;
        }
        // population variance as an exact fraction: (n*sum(x^2) - sum(x)^2) / n^2
        let sum: u64 = counts.values().map(|c| *c as u64).sum();
        let sum_sq: u64 = counts.values().map(|c| (*c as u64).pow(2)).sum();
        let stddev = ((n * sum_sq - sum * sum) as f64).sqrt() / n as f64;
        let score = self.config.balance_base as f64 - self.config.balance_per_stddev as f64 * stddev;
        score.max(0.0).round() as i64
    }

    fn room_utilization(&self, assignment: &Assignment) -> i64 {
        let pairs = assignment
            .iter()
            .map(|(_, value)| (value.room, value.slot))
            .unique()
            .count();
        if pairs == 0 {
            return 0;
        }
        (assignment.len() as f64 / pairs as f64 * self.config.utilization_weight as f64).round() as i64
    }

    fn slot_efficiency(
        &self,
        problem: &Problem,
        assignment: &Assignment,
        unmet: &mut Vec<UnmetSoftConstraint>,
    ) -> i64 {
        // (first halves, second halves) per room and slot
        let mut halves: BTreeMap<(RoomIdx, SlotIdx), (usize, usize)> = BTreeMap::new();
        for (_, value) in assignment.iter() {
            let entry = halves.entry((value.room, value.slot)).or_default();
            match value.occupancy {
                Occupancy::FirstHalf => entry.0 += 1,
                Occupancy::SecondHalf => entry.1 += 1,
                Occupancy::Full => {}
            }
        }

        let mut score = 0;
        for ((room, slot), (first, second)) in halves {
            let pairs = first.min(second);
            let lone = first.max(second) - pairs;
            score += pairs as i64 * self.config.pair_bonus;
            score -= lone as i64 * self.config.lone_half_penalty;
            if lone > 0 {
                let slot = &problem.time_slots[slot.index()];
                unmet.push(UnmetSoftConstraint {
                    constraint_type: "Paired Half Slots".to_string(),
                    description: format!(
                        "Room {} on {:?} at {} has {} unpaired half-slot placement(s)",
                        problem.rooms[room.index()].id,
                        slot.day,
                        slot.start,
                        lone
                    ),
                });
            }
        }
        score
    }
}
