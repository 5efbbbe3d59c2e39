//! Turns a snapshot into variables, candidate domains and the neighbor graph.

use std::collections::HashMap;
use std::time::Instant;

use itertools::Itertools;
use log::{debug, error, info, trace, warn};

use crate::data::{ComponentType, CourseId, InstructorId, Room, RoomType, Snapshot};
use crate::error::InputError;
use crate::model::{
    ConstraintGraph, CourseIdx, CourseInfo, DemandInfo, DomainValue, InstructorIdx,
    InstructorInfo, Problem, RequiredOccupancy, RoomIdx, RoomInfo, SlotIdx, SlotInfo, Variable,
};

/// Students per lecture group.
pub const GROUP_SIZE: u32 = 90;
/// Students per tutorial or lab section.
pub const SECTION_SIZE: u32 = 30;
/// Lecture rooms must seat more than this.
const LECTURE_MIN_CAPACITY: u32 = 25;
/// Tutorial rooms must seat fewer than this.
const TUTORIAL_MAX_CAPACITY: u32 = 50;

pub struct VariableManager<'a> {
    snapshot: &'a Snapshot,
    course_index: HashMap<CourseId, CourseIdx>,
    instructor_index: HashMap<InstructorId, InstructorIdx>,
    /// Running count of variables handed to each instructor.
    workload: Vec<u32>,
}

impl<'a> VariableManager<'a> {
    /// Builds the full problem: variables, then domains, then neighbors.
    pub fn build(snapshot: &'a Snapshot) -> Result<Problem, InputError> {
        let start = Instant::now();
        check_unique("course", snapshot.courses.iter().map(|c| c.id))?;
        check_unique("room", snapshot.rooms.iter().map(|r| r.id))?;
        check_unique("instructor", snapshot.instructors.iter().map(|i| i.id))?;
        check_unique("time slot", snapshot.time_slots.iter().map(|t| t.id))?;

        let mut manager = VariableManager {
            snapshot,
            course_index: snapshot
                .courses
                .iter()
                .enumerate()
                .map(|(i, c)| (c.id, CourseIdx(i)))
                .collect(),
            instructor_index: snapshot
                .instructors
                .iter()
                .enumerate()
                .map(|(i, inst)| (inst.id, InstructorIdx(i)))
                .collect(),
            workload: vec![0; snapshot.instructors.len()],
        };

        let variables = manager.make_variables()?;
        let domains = manager.make_domains(&variables)?;
        let graph = make_neighbors(&variables, &domains, snapshot.rooms.len());

        info!(
            "Built problem with {} variables, {} domain values and {} edges in {:.2?}",
            variables.len(),
            domains.iter().map(Vec::len).sum::<usize>(),
            graph.edge_count(),
            start.elapsed()
        );

        Ok(Problem {
            courses: snapshot
                .courses
                .iter()
                .map(|c| CourseInfo {
                    id: c.id,
                    name: c.name.clone(),
                })
                .collect(),
            rooms: snapshot
                .rooms
                .iter()
                .map(|r| RoomInfo { id: r.id })
                .collect(),
            instructors: snapshot
                .instructors
                .iter()
                .map(|i| InstructorInfo {
                    id: i.id,
                    name: i.name.clone(),
                })
                .collect(),
            time_slots: snapshot
                .time_slots
                .iter()
                .map(|t| SlotInfo {
                    id: t.id,
                    day: t.day,
                    start: t.start,
                    end: t.end,
                })
                .collect(),
            demands: snapshot
                .required_courses
                .iter()
                .map(|rc| DemandInfo {
                    level: rc.level,
                    term: rc.term,
                    faculty: rc.faculty,
                })
                .collect(),
            variables,
            domains,
            graph,
        })
    }

    fn make_variables(&mut self) -> Result<Vec<Variable>, InputError> {
        info!("Making variables...");
        let snapshot = self.snapshot;

        // qualified instructors per course, in link order
        let qualified: HashMap<CourseId, Vec<InstructorIdx>> = snapshot
            .course_instructors
            .iter()
            .filter_map(|link| match self.instructor_index.get(&link.instructor_id) {
                Some(idx) => Some((link.course_id, *idx)),
                None => {
                    warn!(
                        "Course {} links unknown instructor {}; ignoring the link",
                        link.course_id, link.instructor_id
                    );
                    None
                }
            })
            .into_group_map();

        let mut variables = Vec::new();
        for (demand, required) in snapshot.required_courses.iter().enumerate() {
            let course_idx = *self
                .course_index
                .get(&required.course_id)
                .ok_or(InputError::UnknownCourse(required.course_id))?;
            if required.capacity == 0 {
                return Err(InputError::InvalidCapacity(required.course_id));
            }
            let course = &snapshot.courses[course_idx.index()];
            let candidates = qualified
                .get(&required.course_id)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let group_count = required.capacity.div_ceil(GROUP_SIZE);
            let section_count = required.capacity.div_ceil(SECTION_SIZE);
            debug!(
                "Course {} ({}): capacity {}, {} groups, {} sections",
                course.id, course.name, required.capacity, group_count, section_count
            );

            for component in &course.components {
                let component = component.component_type;
                let (count, size) = match component {
                    ComponentType::Lecture => (group_count, GROUP_SIZE),
                    ComponentType::Tutorial | ComponentType::Lab => (section_count, SECTION_SIZE),
                };
                for n in 1..=count {
                    let (group_no, section_no) = match component {
                        ComponentType::Lecture => (n, 0),
                        ComponentType::Tutorial | ComponentType::Lab => {
                            ((n - 1) * SECTION_SIZE / GROUP_SIZE + 1, n)
                        }
                    };
                    let instructor = match component {
                        ComponentType::Lecture => {
                            self.pick_lecturer(required.preferred_instructor_id, candidates)
                        }
                        ComponentType::Tutorial | ComponentType::Lab => {
                            self.pick_assistant(candidates)
                        }
                    };
                    if let Some(idx) = instructor {
                        self.workload[idx.index()] += 1;
                    } else {
                        warn!(
                            "No instructor found for course {} ({}) group {} section {}",
                            course.id, component, group_no, section_no
                        );
                    }
                    let capacity = (required.capacity - (n - 1) * size).min(size);
                    trace!(
                        "Variable {}: course {} {} g{} s{} capacity {}",
                        variables.len(),
                        course.id,
                        component,
                        group_no,
                        section_no,
                        capacity
                    );
                    variables.push(Variable {
                        course: course_idx,
                        component,
                        group_no,
                        section_no,
                        instructor,
                        occupancy: RequiredOccupancy::for_component(component),
                        course_name: course.name.clone(),
                        capacity,
                        demand,
                    });
                }
            }
        }

        if variables.is_empty() {
            return Err(InputError::NoVariables);
        }
        info!(
            "Made {} variables from {} required courses",
            variables.len(),
            snapshot.required_courses.len()
        );
        Ok(variables)
    }

    /// The pinned instructor if known, else the least-loaded qualified professor.
    fn pick_lecturer(
        &self,
        pinned: Option<InstructorId>,
        candidates: &[InstructorIdx],
    ) -> Option<InstructorIdx> {
        if let Some(id) = pinned {
            match self.instructor_index.get(&id) {
                Some(idx) => return Some(*idx),
                None => warn!("Pinned instructor {id} does not exist; choosing by workload"),
            }
        }
        self.least_loaded(candidates, |idx| {
            self.snapshot.instructors[idx.index()].is_professor()
        })
    }

    /// The least-loaded qualified instructor who is not a professor.
    fn pick_assistant(&self, candidates: &[InstructorIdx]) -> Option<InstructorIdx> {
        self.least_loaded(candidates, |idx| {
            !self.snapshot.instructors[idx.index()].is_professor()
        })
    }

    fn least_loaded(
        &self,
        candidates: &[InstructorIdx],
        eligible: impl Fn(InstructorIdx) -> bool,
    ) -> Option<InstructorIdx> {
        // min_by_key keeps the first of equal minima, so ties go to first-seen
        candidates
            .iter()
            .copied()
            .unique()
            .filter(|idx| eligible(*idx))
            .min_by_key(|idx| self.workload[idx.index()])
    }

    fn make_domains(&self, variables: &[Variable]) -> Result<Vec<Vec<DomainValue>>, InputError> {
        info!("Making domains...");
        let snapshot = self.snapshot;
        if snapshot.time_slots.is_empty() {
            return Err(InputError::NoTimeSlots);
        }

        let mut empty = Vec::new();
        let mut domains = Vec::with_capacity(variables.len());
        for (var, variable) in variables.iter().enumerate() {
            let rooms = candidate_rooms(&snapshot.rooms, variable.component);
            if rooms.is_empty() {
                error!(
                    "Variable {var} has empty domain: course {}, type {}",
                    variable.course_name, variable.component
                );
                empty.push(var);
            }
            let placements = variable.occupancy.placements();
            let mut domain = Vec::with_capacity(rooms.len() * snapshot.time_slots.len() * placements.len());
            for room in rooms {
                for slot in 0..snapshot.time_slots.len() {
                    for occupancy in placements {
                        domain.push(DomainValue::new(room, SlotIdx(slot), *occupancy));
                    }
                }
            }
            domains.push(domain);
        }

        if let Some(&first) = empty.first() {
            let variable = &variables[first];
            return Err(InputError::EmptyDomains {
                count: empty.len(),
                first: format!("{} {}", variable.course_name, variable.component),
            });
        }
        Ok(domains)
    }
}

/// Rooms a component may use, in snapshot order.
pub fn candidate_rooms(rooms: &[Room], component: ComponentType) -> Vec<RoomIdx> {
    rooms
        .iter()
        .enumerate()
        .filter(|(_, room)| match component {
            ComponentType::Lecture => {
                room.room_type.hosts_lectures() && room.capacity > LECTURE_MIN_CAPACITY
            }
            ComponentType::Lab => room.room_type.is_lab_space(),
            ComponentType::Tutorial => {
                room.room_type == RoomType::Classroom
                    && room.capacity < TUTORIAL_MAX_CAPACITY
            }
        })
        .map(|(i, _)| RoomIdx(i))
        .collect()
}

/// Connects variables that share an instructor or could land in the same room.
///
/// Works from room and instructor inverted indexes, so a variable is only ever
/// compared with variables that actually touch one of its resources.
fn make_neighbors(
    variables: &[Variable],
    domains: &[Vec<DomainValue>],
    room_count: usize,
) -> ConstraintGraph {
    info!("Making neighbors...");
    let mut by_room: Vec<Vec<usize>> = vec![Vec::new(); room_count];
    let mut rooms_of: Vec<Vec<RoomIdx>> = Vec::with_capacity(variables.len());
    for (var, domain) in domains.iter().enumerate() {
        let rooms: Vec<RoomIdx> = domain.iter().map(|v| v.room).dedup().collect();
        for room in &rooms {
            by_room[room.index()].push(var);
        }
        rooms_of.push(rooms);
    }
    let by_instructor: HashMap<InstructorIdx, Vec<usize>> = variables
        .iter()
        .enumerate()
        .filter_map(|(var, v)| v.instructor.map(|idx| (idx, var)))
        .into_group_map();

    // stamp[other] == var + 1 marks `other` as already collected for `var`
    let mut stamp = vec![0usize; variables.len()];
    let mut adjacency = Vec::with_capacity(variables.len());
    for (var, variable) in variables.iter().enumerate() {
        let mut neighbors = Vec::new();
        let instructor_peers = variable
            .instructor
            .and_then(|idx| by_instructor.get(&idx))
            .into_iter()
            .flatten();
        let room_peers = rooms_of[var]
            .iter()
            .flat_map(|room| by_room[room.index()].iter());
        for &other in room_peers.chain(instructor_peers) {
            if other != var && stamp[other] != var + 1 {
                stamp[other] = var + 1;
                neighbors.push(other);
            }
        }
        neighbors.sort_unstable();
        adjacency.push(neighbors);
    }
    ConstraintGraph::from_adjacency(adjacency)
}

fn check_unique(kind: &'static str, ids: impl Iterator<Item = u32>) -> Result<(), InputError> {
    match ids.duplicates().next() {
        Some(id) => Err(InputError::DuplicateId { kind, id }),
        None => Ok(()),
    }
}
