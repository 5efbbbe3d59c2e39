//! Post-solve validation of an assignment before it is committed.
//!
//! Independent of the solver's pairwise check: placements are bucketed per
//! (room, slot) and per (instructor, slot) and every bucket must obey the
//! half-slot law, i.e. one full placement, or at most one first half plus at
//! most one second half. Any hit here means the engine produced something it
//! should not have, so the commit is refused.

use std::collections::BTreeMap;
use std::fmt;

use crate::data::Occupancy;
use crate::model::{Assignment, DomainValue, InstructorIdx, Problem, RoomIdx, SlotIdx};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    /// A room hosts an illegal mix of placements in one slot.
    RoomDoubleBooked { room: RoomIdx, slot: SlotIdx, variables: Vec<usize> },
    /// An instructor is in two places at once.
    InstructorDoubleBooked {
        instructor: InstructorIdx,
        slot: SlotIdx,
        variables: Vec<usize>,
    },
    /// A variable was given a value outside its own domain.
    OutsideDomain { variable: usize },
    /// A variable has no value at all.
    Unassigned { variable: usize },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Returns every conflict in `assignment`; empty means it is safe to commit.
pub fn validate(problem: &Problem, assignment: &Assignment) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    let mut by_room: BTreeMap<(RoomIdx, SlotIdx), Vec<(usize, Occupancy)>> = BTreeMap::new();
    let mut by_instructor: BTreeMap<(InstructorIdx, SlotIdx), Vec<(usize, Occupancy)>> =
        BTreeMap::new();

    for var in 0..problem.variable_count() {
        let Some(value) = assignment.get(var) else {
            conflicts.push(Conflict {
                kind: ConflictKind::Unassigned { variable: var },
                message: format!("{} has no placement", problem.describe(var)),
            });
            continue;
        };
        if !in_domain(problem, var, value) {
            conflicts.push(Conflict {
                kind: ConflictKind::OutsideDomain { variable: var },
                message: format!("{} placed outside its domain: {value:?}", problem.describe(var)),
            });
        }
        by_room
            .entry((value.room, value.slot))
            .or_default()
            .push((var, value.occupancy));
        if let Some(instructor) = problem.variables[var].instructor {
            by_instructor
                .entry((instructor, value.slot))
                .or_default()
                .push((var, value.occupancy));
        }
    }

    for ((room, slot), placed) in by_room {
        if !obeys_half_slot_law(&placed) {
            let variables: Vec<usize> = placed.iter().map(|(v, _)| *v).collect();
            conflicts.push(Conflict {
                message: format!(
                    "room {} double-booked in slot {} by variables {:?}",
                    problem.rooms[room.index()].id,
                    problem.time_slots.get(slot.index()).map_or(slot.index() as u32, |s| s.id),
                    variables
                ),
                kind: ConflictKind::RoomDoubleBooked { room, slot, variables },
            });
        }
    }
    for ((instructor, slot), placed) in by_instructor {
        if !obeys_half_slot_law(&placed) {
            let variables: Vec<usize> = placed.iter().map(|(v, _)| *v).collect();
            conflicts.push(Conflict {
                message: format!(
                    "instructor {} double-booked in slot {} by variables {:?}",
                    problem.instructors[instructor.index()].id,
                    problem.time_slots.get(slot.index()).map_or(slot.index() as u32, |s| s.id),
                    variables
                ),
                kind: ConflictKind::InstructorDoubleBooked {
                    instructor,
                    slot,
                    variables,
                },
            });
        }
    }
    conflicts
}

/// One full placement, or at most one of each half.
pub fn obeys_half_slot_law(placed: &[(usize, Occupancy)]) -> bool {
    let count = |wanted: Occupancy| placed.iter().filter(|(_, o)| *o == wanted).count();
    let (full, first, second) = (
        count(Occupancy::Full),
        count(Occupancy::FirstHalf),
        count(Occupancy::SecondHalf),
    );
    match full {
        0 => first <= 1 && second <= 1,
        1 => first == 0 && second == 0,
        _ => false,
    }
}

fn in_domain(problem: &Problem, var: usize, value: DomainValue) -> bool {
    problem.domains[var].contains(&value)
}
