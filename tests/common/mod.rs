#![allow(dead_code)]

use timetable_solver::data::{
    ClockTime, ComponentType, Course, CourseComponent, CourseInstructorLink, Day, Faculty,
    Instructor, InstructorRole, RequiredCourse, Room, RoomType, Snapshot, Term, TimeSlot,
};

const DAYS: [Day; 5] = [Day::Sun, Day::Mon, Day::Tue, Day::Wed, Day::Thu];
/// Five 90 minute slots a day starting at 09:00, 15 minutes apart.
const SLOTS_PER_DAY: u16 = 5;

/// Small builder for test snapshots.
#[derive(Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` consecutive slots, filling each day before moving on.
    pub fn slots(mut self, count: u16) -> Self {
        for k in 0..count {
            let start = 9 * 60 + (k % SLOTS_PER_DAY) * 105;
            let end = start + 90;
            self.snapshot.time_slots.push(TimeSlot {
                id: k as u32 + 1,
                day: DAYS[(k / SLOTS_PER_DAY) as usize % DAYS.len()],
                start: ClockTime::new(start / 60, start % 60),
                end: ClockTime::new(end / 60, end % 60),
            });
        }
        self
    }

    pub fn room(mut self, id: u32, room_type: RoomType, capacity: u32) -> Self {
        self.snapshot.rooms.push(Room {
            id,
            room_type,
            capacity,
        });
        self
    }

    pub fn professor(self, id: u32) -> Self {
        self.instructor(id, InstructorRole::Prof)
    }

    pub fn assistant(self, id: u32) -> Self {
        self.instructor(id, InstructorRole::Ta)
    }

    fn instructor(mut self, id: u32, role: InstructorRole) -> Self {
        self.snapshot.instructors.push(Instructor {
            id,
            name: format!("Instructor {id}"),
            roles: vec![role],
        });
        self
    }

    /// Adds a course, its demand for `capacity` students and links to `staff`.
    pub fn course(
        mut self,
        id: u32,
        components: &[ComponentType],
        capacity: u32,
        staff: &[u32],
    ) -> Self {
        self.snapshot.courses.push(Course {
            id,
            name: format!("Course {id}"),
            components: components
                .iter()
                .map(|c| CourseComponent { component_type: *c })
                .collect(),
        });
        self.snapshot.required_courses.push(RequiredCourse {
            course_id: id,
            capacity,
            level: 1,
            term: Term::Fall,
            faculty: Faculty::Csit,
            preferred_instructor_id: None,
        });
        self.snapshot
            .course_instructors
            .extend(staff.iter().map(|instructor_id| CourseInstructorLink {
                course_id: id,
                instructor_id: *instructor_id,
            }));
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

/// A department-sized instance with every component type.
pub fn department(courses: u32) -> Snapshot {
    let mut builder = SnapshotBuilder::new()
        .slots(25)
        .room(1, RoomType::Theater, 200)
        .room(2, RoomType::Hall, 120)
        .room(3, RoomType::Classroom, 40)
        .room(4, RoomType::Classroom, 35)
        .room(5, RoomType::ComputerLab, 30)
        .room(6, RoomType::PhysicsLab, 30);
    for id in 1..=4 {
        builder = builder.professor(id);
    }
    for id in 11..=16 {
        builder = builder.assistant(id);
    }
    for course in 1..=courses {
        let professor = (course - 1) % 4 + 1;
        let assistants = [(course - 1) % 6 + 11, course % 6 + 11];
        let components: &[ComponentType] = if course % 2 == 0 {
            &[ComponentType::Lecture, ComponentType::Lab]
        } else {
            &[ComponentType::Lecture, ComponentType::Tutorial]
        };
        builder = builder.course(
            course,
            components,
            60,
            &[professor, assistants[0], assistants[1]],
        );
    }
    builder.build()
}
