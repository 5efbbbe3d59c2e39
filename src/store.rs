//! Persistence boundary: snapshot reads, term resets and transactional commits.

use std::collections::HashSet;
use std::io::Read;

use log::{debug, info};

use crate::data::{Occupancy, ScheduleEntry, Snapshot, Term, TimeSlotId};
use crate::error::StoreError;

/// What the engine needs from whatever stores courses, rooms and timetables.
pub trait PersistenceAdapter {
    /// Reads everything needed for one solve.
    fn snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Drops previously committed entries for `term`.
    fn reset(&mut self, term: Term) -> Result<(), StoreError>;

    /// Writes all `entries` or none of them. Returns the number written.
    fn commit(&mut self, entries: &[ScheduleEntry]) -> Result<usize, StoreError>;

    /// Drops every entry of `terms` and writes `entries` as one transaction.
    /// On error the stored timetable is left exactly as it was.
    fn replace(&mut self, terms: &[Term], entries: &[ScheduleEntry]) -> Result<usize, StoreError>;

    /// Entries currently stored.
    fn entries(&self) -> Vec<ScheduleEntry>;
}

/// Keeps the snapshot and the committed timetable in memory.
///
/// Row checks mirror the unique keys of a schedules table, extended to the
/// half-slot law: a (room, slot) or (instructor, slot) may carry one full
/// entry or one entry per half.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    snapshot: Snapshot,
    entries: Vec<ScheduleEntry>,
}

impl InMemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            entries: Vec::new(),
        }
    }

    pub fn from_json_reader(reader: impl Read) -> Result<Self, StoreError> {
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        Ok(Self::new(snapshot))
    }

    /// The table as it would look after dropping `terms` and adding `entries`.
    /// The live table is only swapped by the caller once every row passed.
    fn stage(&self, terms: &[Term], entries: &[ScheduleEntry]) -> Result<Vec<ScheduleEntry>, StoreError> {
        let mut staged: Vec<ScheduleEntry> = self
            .entries
            .iter()
            .filter(|entry| !terms.contains(&entry.term))
            .cloned()
            .collect();
        let mut rooms: HashSet<SlotClaim> = HashSet::new();
        let mut instructors: HashSet<SlotClaim> = HashSet::new();
        for entry in &staged {
            claim(&mut rooms, &mut instructors, entry).map_err(|reason| StoreError::RowRejected {
                row: 0,
                reason: format!("existing entry: {reason}"),
            })?;
        }
        for (row, entry) in entries.iter().enumerate() {
            claim(&mut rooms, &mut instructors, entry)
                .map_err(|reason| StoreError::RowRejected { row, reason })?;
            staged.push(entry.clone());
        }
        Ok(staged)
    }
}

impl PersistenceAdapter for InMemoryStore {
    fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.snapshot.clone())
    }

    fn reset(&mut self, term: Term) -> Result<(), StoreError> {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.term != term);
        debug!("Reset {:?}: removed {} entries", term, before - self.entries.len());
        Ok(())
    }

    fn commit(&mut self, entries: &[ScheduleEntry]) -> Result<usize, StoreError> {
        self.entries = self.stage(&[], entries)?;
        info!("Committed {} schedule entries", entries.len());
        Ok(entries.len())
    }

    fn replace(&mut self, terms: &[Term], entries: &[ScheduleEntry]) -> Result<usize, StoreError> {
        let staged = self.stage(terms, entries)?;
        debug!(
            "Replace dropped {} entries of {:?}",
            self.entries.len() + entries.len() - staged.len(),
            terms
        );
        self.entries = staged;
        info!("Committed {} schedule entries", entries.len());
        Ok(entries.len())
    }

    fn entries(&self) -> Vec<ScheduleEntry> {
        self.entries.clone()
    }
}

/// (term, room or instructor id, slot, occupancy)
type SlotClaim = (Term, u32, TimeSlotId, Occupancy);

fn claim(
    rooms: &mut HashSet<SlotClaim>,
    instructors: &mut HashSet<SlotClaim>,
    entry: &ScheduleEntry,
) -> Result<(), String> {
    if !claim_slot(rooms, entry.term, entry.room_id, entry.time_slot_id, entry.occupancy) {
        return Err(format!(
            "room {} already taken in slot {} ({})",
            entry.room_id, entry.time_slot_id, entry.occupancy
        ));
    }
    if let Some(instructor) = entry.instructor_id {
        if !claim_slot(instructors, entry.term, instructor, entry.time_slot_id, entry.occupancy) {
            return Err(format!(
                "instructor {} already busy in slot {} ({})",
                instructor, entry.time_slot_id, entry.occupancy
            ));
        }
    }
    Ok(())
}

/// A full claim blocks both halves and vice versa; each half can be claimed once.
fn claim_slot(
    taken: &mut HashSet<SlotClaim>,
    term: Term,
    owner: u32,
    slot: TimeSlotId,
    occupancy: Occupancy,
) -> bool {
    let blockers: &[Occupancy] = match occupancy {
        Occupancy::Full => &[Occupancy::Full, Occupancy::FirstHalf, Occupancy::SecondHalf],
        Occupancy::FirstHalf => &[Occupancy::Full, Occupancy::FirstHalf],
        Occupancy::SecondHalf => &[Occupancy::Full, Occupancy::SecondHalf],
    };
    if blockers.iter().any(|o| taken.contains(&(term, owner, slot, *o))) {
        return false;
    }
    taken.insert((term, owner, slot, occupancy))
}
