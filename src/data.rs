use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Type aliases for the ids used by the persistence layer
pub type CourseId = u32;
pub type RoomId = u32;
pub type InstructorId = u32;
pub type TimeSlotId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Fall,
    Spring,
    Summer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Faculty {
    #[serde(rename = "CSIT")]
    Csit,
    #[serde(rename = "FOE")]
    Foe,
    #[serde(rename = "BAS")]
    Bas,
    #[serde(rename = "FIBH")]
    Fibh,
    Art,
    Pharma,
    #[serde(rename = "ARCH")]
    Arch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Day {
    Sat,
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

/// The kind of session a course component needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum ComponentType {
    Lecture,
    Tutorial,
    Lab,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentType::Lecture => "Lecture",
            ComponentType::Tutorial => "Tutorial",
            ComponentType::Lab => "Lab",
        };
        f.write_str(name)
    }
}

/// How much of a time block a placement consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Occupancy {
    Full,
    FirstHalf,
    SecondHalf,
}

impl fmt::Display for Occupancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Occupancy::Full => "full",
            Occupancy::FirstHalf => "first_half",
            Occupancy::SecondHalf => "second_half",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructorRole {
    Prof,
    Ta,
    LabTa,
}

/// Room category. Known names map to their variant; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum RoomType {
    Classroom,
    ComputerLab,
    Theater,
    Hall,
    BioLab,
    DrawingStudio,
    PhysicsLab,
    DrawingLab,
    Other(String),
}

impl RoomType {
    pub fn name(&self) -> &str {
        match self {
            RoomType::Classroom => "Classroom",
            RoomType::ComputerLab => "ComputerLab",
            RoomType::Theater => "Theater",
            RoomType::Hall => "Hall",
            RoomType::BioLab => "BioLab",
            RoomType::DrawingStudio => "DrawingStudio",
            RoomType::PhysicsLab => "PhysicsLab",
            RoomType::DrawingLab => "DrawingLab",
            RoomType::Other(name) => name,
        }
    }

    /// Whether lectures may be held here (capacity is checked separately).
    pub fn hosts_lectures(&self) -> bool {
        matches!(self, RoomType::Classroom | RoomType::Theater | RoomType::Hall)
    }

    /// Lab-style rooms: the enumerated lab set or any type named like a lab or studio.
    pub fn is_lab_space(&self) -> bool {
        match self {
            RoomType::ComputerLab
            | RoomType::BioLab
            | RoomType::DrawingStudio
            | RoomType::PhysicsLab
            | RoomType::DrawingLab => true,
            RoomType::Other(name) => name.contains("Lab") || name.contains("Studio"),
            RoomType::Classroom | RoomType::Theater | RoomType::Hall => false,
        }
    }
}

impl From<String> for RoomType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Classroom" => RoomType::Classroom,
            "ComputerLab" => RoomType::ComputerLab,
            "Theater" | "Theatre" => RoomType::Theater,
            "Hall" => RoomType::Hall,
            "BioLab" => RoomType::BioLab,
            "DrawingStudio" => RoomType::DrawingStudio,
            "PhysicsLab" => RoomType::PhysicsLab,
            "DrawingLab" => RoomType::DrawingLab,
            _ => RoomType::Other(name),
        }
    }
}

impl From<RoomType> for String {
    fn from(room_type: RoomType) -> Self {
        room_type.name().to_string()
    }
}

/// Wall-clock time of day with minute resolution, written as "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    minutes: u16,
}

impl ClockTime {
    pub const fn new(hour: u16, minute: u16) -> Self {
        Self {
            minutes: hour * 60 + minute,
        }
    }
}

impl FromStr for ClockTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':');
        let (Some(hour), Some(minute)) = (parts.next(), parts.next()) else {
            return Err(format!("'{s}' is not a HH:MM time"));
        };
        // tolerate a trailing seconds field, as SQL TIME columns carry one
        if parts.next().is_some_and(|sec| sec.parse::<u16>().is_err()) {
            return Err(format!("'{s}' has an invalid seconds field"));
        }
        let hour: u16 = hour.parse().map_err(|_| format!("'{s}' has an invalid hour"))?;
        let minute: u16 = minute
            .parse()
            .map_err(|_| format!("'{s}' has an invalid minute"))?;
        if hour > 23 || minute > 59 {
            return Err(format!("'{s}' is out of range"));
        }
        Ok(ClockTime::new(hour, minute))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes / 60, self.minutes % 60)
    }
}

/// Demand for one course in the term being scheduled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredCourse {
    pub course_id: CourseId,
    pub capacity: u32,
    pub level: u32,
    pub term: Term,
    pub faculty: Faculty,
    #[serde(default)]
    pub preferred_instructor_id: Option<InstructorId>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseComponent {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub components: Vec<CourseComponent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructor {
    pub id: InstructorId,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<InstructorRole>,
}

impl Instructor {
    pub fn is_professor(&self) -> bool {
        self.roles.contains(&InstructorRole::Prof)
    }
}

/// Marks an instructor as qualified to teach a course.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInstructorLink {
    pub course_id: CourseId,
    pub instructor_id: InstructorId,
}

/// Represents a physical room with a given capacity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: TimeSlotId,
    pub day: Day,
    pub start: ClockTime,
    pub end: ClockTime,
}

/// Everything the engine reads before a solve. Fetched once; never re-read mid-solve.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub required_courses: Vec<RequiredCourse>,
    pub courses: Vec<Course>,
    pub instructors: Vec<Instructor>,
    #[serde(default)]
    pub course_instructors: Vec<CourseInstructorLink>,
    pub rooms: Vec<Room>,
    pub time_slots: Vec<TimeSlot>,
}

/// Represents a single, scheduled course-component placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub level: u32,
    pub term: Term,
    pub faculty: Faculty,
    pub course_id: CourseId,
    pub component_type: ComponentType,
    pub occupancy: Occupancy,
    pub instructor_id: Option<InstructorId>,
    pub room_id: RoomId,
    pub time_slot_id: TimeSlotId,
    pub group_no: u32,
    pub section_no: u32,
}

/// Describes a soft constraint that was not met in the final timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_time_parses_sql_and_short_forms() {
        assert_eq!("09:00".parse::<ClockTime>(), Ok(ClockTime::new(9, 0)));
        assert_eq!("14:15:00".parse::<ClockTime>(), Ok(ClockTime::new(14, 15)));
        assert!("24:00".parse::<ClockTime>().is_err());
        assert!("nine".parse::<ClockTime>().is_err());
        assert_eq!(ClockTime::new(8, 5).to_string(), "08:05");
    }

    #[test]
    fn room_type_accepts_free_form_names() {
        let theatre: RoomType = serde_json::from_str("\"Theatre\"").unwrap();
        assert_eq!(theatre, RoomType::Theater);

        let studio: RoomType = serde_json::from_str("\"SoundStudio\"").unwrap();
        assert_eq!(studio, RoomType::Other("SoundStudio".into()));
        assert!(studio.is_lab_space());
        assert!(!RoomType::Classroom.is_lab_space());
        assert_eq!(serde_json::to_string(&RoomType::BioLab).unwrap(), "\"BioLab\"");
    }

    #[test]
    fn snapshot_reads_camel_case_json() {
        let json = r#"{
            "requiredCourses": [{"courseId": 1, "capacity": 90, "level": 1, "term": "fall", "faculty": "CSIT"}],
            "courses": [{"id": 1, "name": "Programming I", "components": [{"type": "Lecture"}, {"type": "Tutorial"}]}],
            "instructors": [{"id": 7, "name": "Dr. Salem", "roles": ["prof"]}],
            "courseInstructors": [{"courseId": 1, "instructorId": 7}],
            "rooms": [{"id": 3, "type": "Hall", "capacity": 120}],
            "timeSlots": [{"id": 1, "day": "Sun", "start": "09:00", "end": "10:30"}]
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.required_courses[0].preferred_instructor_id, None);
        assert_eq!(snapshot.courses[0].components[1].component_type, ComponentType::Tutorial);
        assert!(snapshot.instructors[0].is_professor());
        assert_eq!(snapshot.time_slots[0].start, ClockTime::new(9, 0));
    }
}
