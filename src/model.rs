//! Engine-side problem representation.
//!
//! Snapshot ids are resolved once into dense index newtypes so that a room
//! index can never be compared against a time-slot index by accident.

use std::fmt;

use crate::data::{
    ClockTime, ComponentType, CourseId, Day, Faculty, InstructorId, Occupancy, RoomId, Term,
    TimeSlotId,
};

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

index_type!(
    /// Position of a course in [`Problem::courses`].
    CourseIdx
);
index_type!(
    /// Position of a room in [`Problem::rooms`].
    RoomIdx
);
index_type!(
    /// Position of an instructor in [`Problem::instructors`].
    InstructorIdx
);
index_type!(
    /// Position of a time slot in [`Problem::time_slots`].
    SlotIdx
);

/// What a variable asks of its placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredOccupancy {
    Full,
    Half,
}

impl RequiredOccupancy {
    pub fn for_component(component: ComponentType) -> Self {
        match component {
            ComponentType::Lecture | ComponentType::Lab => RequiredOccupancy::Full,
            ComponentType::Tutorial => RequiredOccupancy::Half,
        }
    }

    /// The occupancies a placement of this kind may take, in domain order.
    pub fn placements(self) -> &'static [Occupancy] {
        match self {
            RequiredOccupancy::Full => &[Occupancy::Full],
            RequiredOccupancy::Half => &[Occupancy::FirstHalf, Occupancy::SecondHalf],
        }
    }
}

/// One schedulable course-component instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub course: CourseIdx,
    pub component: ComponentType,
    pub group_no: u32,
    pub section_no: u32,
    pub instructor: Option<InstructorIdx>,
    pub occupancy: RequiredOccupancy,
    pub course_name: String,
    pub capacity: u32,
    /// Index of the demand record this variable came from.
    pub demand: usize,
}

/// A candidate placement for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainValue {
    pub room: RoomIdx,
    pub slot: SlotIdx,
    pub occupancy: Occupancy,
}

impl DomainValue {
    pub fn new(room: RoomIdx, slot: SlotIdx, occupancy: Occupancy) -> Self {
        Self {
            room,
            slot,
            occupancy,
        }
    }
}

/// Symmetric adjacency over variable indices. Lists are sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintGraph {
    adjacency: Vec<Vec<usize>>,
}

impl ConstraintGraph {
    pub fn from_adjacency(adjacency: Vec<Vec<usize>>) -> Self {
        Self { adjacency }
    }

    pub fn neighbors(&self, var: usize) -> &[usize] {
        &self.adjacency[var]
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }
}

/// Partial or total map from variable index to placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    values: Vec<Option<DomainValue>>,
    assigned: usize,
}

impl Assignment {
    pub fn new(variable_count: usize) -> Self {
        Self {
            values: vec![None; variable_count],
            assigned: 0,
        }
    }

    pub fn assign(&mut self, var: usize, value: DomainValue) {
        if self.values[var].replace(value).is_none() {
            self.assigned += 1;
        }
    }

    pub fn unassign(&mut self, var: usize) -> Option<DomainValue> {
        let previous = self.values[var].take();
        if previous.is_some() {
            self.assigned -= 1;
        }
        previous
    }

    pub fn get(&self, var: usize) -> Option<DomainValue> {
        self.values[var]
    }

    pub fn is_assigned(&self, var: usize) -> bool {
        self.values[var].is_some()
    }

    pub fn len(&self) -> usize {
        self.assigned
    }

    pub fn is_empty(&self) -> bool {
        self.assigned == 0
    }

    pub fn is_complete(&self) -> bool {
        self.assigned == self.values.len()
    }

    /// Assigned `(variable, value)` pairs in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, DomainValue)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(var, value)| value.map(|v| (var, v)))
    }
}

#[derive(Debug, Clone)]
pub struct CourseInfo {
    pub id: CourseId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub id: RoomId,
}

#[derive(Debug, Clone)]
pub struct InstructorInfo {
    pub id: InstructorId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub id: TimeSlotId,
    pub day: Day,
    pub start: ClockTime,
    pub end: ClockTime,
}

/// Level, term and faculty of one demand record, carried through to the saved entries.
#[derive(Debug, Clone, Copy)]
pub struct DemandInfo {
    pub level: u32,
    pub term: Term,
    pub faculty: Faculty,
}

/// The solver's complete input: resolved entities, variables, domains and the graph.
#[derive(Debug, Clone)]
pub struct Problem {
    pub courses: Vec<CourseInfo>,
    pub rooms: Vec<RoomInfo>,
    pub instructors: Vec<InstructorInfo>,
    pub time_slots: Vec<SlotInfo>,
    pub demands: Vec<DemandInfo>,
    pub variables: Vec<Variable>,
    pub domains: Vec<Vec<DomainValue>>,
    pub graph: ConstraintGraph,
}

impl Problem {
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Human-readable identity of a variable for logs and diagnostics.
    pub fn describe(&self, var: usize) -> VariableLabel<'_> {
        VariableLabel { problem: self, var }
    }
}

pub struct VariableLabel<'a> {
    problem: &'a Problem,
    var: usize,
}

impl fmt::Display for VariableLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variable = &self.problem.variables[self.var];
        let course = &self.problem.courses[variable.course.index()];
        write!(
            f,
            "#{} {} ({}) {} g{}",
            self.var, course.name, course.id, variable.component, variable.group_no
        )?;
        if variable.section_no > 0 {
            write!(f, "/s{}", variable.section_no)?;
        }
        match variable.instructor {
            Some(idx) => write!(f, " instructor {}", self.problem.instructors[idx.index()].id),
            None => write!(f, " no instructor"),
        }
    }
}
