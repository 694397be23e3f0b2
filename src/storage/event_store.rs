use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Weekday;
use thiserror::Error;

use crate::schedule::{ClockTime, EventId, Occupant, ScheduleEvent};
use crate::schedule::time_model::MINUTES_PER_HOUR;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Event not found: {0}")]
    EventNotFound(EventId),
    #[error("Occupant {occupant} not found in event {event}")]
    OccupantNotFound { event: EventId, occupant: u64 },
    #[error("Event {0} is at capacity")]
    CapacityExceeded(EventId),
    #[error("Invalid time range {start}-{end} for event {event}")]
    InvalidRange {
        event: EventId,
        start: ClockTime,
        end: ClockTime,
    },
}

/// Store shared between the UI loop and in-flight persistence tasks.
pub type SharedStore = Arc<Mutex<ScheduleEventStore>>;

pub fn shared(store: ScheduleEventStore) -> SharedStore {
    Arc::new(Mutex::new(store))
}

pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, ScheduleEventStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub day: Option<Weekday>,
    pub start: Option<ClockTime>,
    pub end: Option<ClockTime>,
    pub occupants: Option<Vec<Occupant>>,
}

impl EventPatch {
    pub fn reschedule(day: Weekday, start: ClockTime, end: ClockTime) -> Self {
        Self {
            day: Some(day),
            start: Some(start),
            end: Some(end),
            occupants: None,
        }
    }

}

/// Copies of a set of events taken at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    events: Vec<ScheduleEvent>,
}

impl Snapshot {
    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    pub fn event_ids(&self) -> Vec<EventId> {
        self.events.iter().map(|e| e.id).collect()
    }

    /// True while every captured event is still exactly as captured.
    pub fn is_current_in(&self, store: &ScheduleEventStore) -> bool {
        self.events
            .iter()
            .all(|captured| store.get(captured.id) == Some(captured))
    }
}

/// Events of the visible period.
///
/// `replace_all`, `patch_event` and `move_occupant` are the only writers
/// besides `restore`, which puts back a state the store already held.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleEventStore {
    events: Vec<ScheduleEvent>,
}

impl ScheduleEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<ScheduleEvent>) -> Self {
        let mut store = Self::new();
        store.replace_all(events);
        store
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    pub fn get(&self, id: EventId) -> Option<&ScheduleEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn events_for_day(&self, day: Weekday) -> Vec<&ScheduleEvent> {
        let mut events: Vec<&ScheduleEvent> =
            self.events.iter().filter(|e| e.day == day).collect();
        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        events
    }

    /// Events whose start lies in `[hour:00, hour+1:00)`. A card renders only in
    /// the bucket holding its start and overflows visually into later hours.
    pub fn events_starting_in_hour_bucket(&self, day: Weekday, hour: u32) -> Vec<&ScheduleEvent> {
        let bucket_start = hour * MINUTES_PER_HOUR;
        let bucket_end = bucket_start + MINUTES_PER_HOUR;
        self.events_for_day(day)
            .into_iter()
            .filter(|e| e.start.minutes() >= bucket_start && e.start.minutes() < bucket_end)
            .collect()
    }

    /// Class ids the occupant is a regular member of, derived by scanning the
    /// store. Makeup visits do not count. Only meaningful while the store is
    /// the single source of truth for the period.
    pub fn memberships_of(&self, occupant_id: u64) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .events
            .iter()
            .filter(|e| e.has_member(occupant_id))
            .filter_map(|e| e.id.class_id())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Every event carrying an entry for the occupant, makeups included.
    pub fn events_with_occupant(&self, occupant_id: u64) -> Vec<EventId> {
        self.events
            .iter()
            .filter(|e| e.occupant(occupant_id).is_some())
            .map(|e| e.id)
            .collect()
    }

    pub fn replace_all(&mut self, events: Vec<ScheduleEvent>) {
        tracing::debug!("Replacing schedule with {} events", events.len());
        self.events = events;
    }

    pub fn patch_event(&mut self, id: EventId, patch: EventPatch) -> Result<(), StoreError> {
        let index = self.index_of(id)?;
        let current = &self.events[index];

        let start = patch.start.unwrap_or(current.start);
        let end = patch.end.unwrap_or(current.end);
        if start >= end || !end.is_within_day() {
            return Err(StoreError::InvalidRange { event: id, start, end });
        }
        if let Some(occupants) = &patch.occupants
            && occupants.len() > current.capacity as usize
        {
            return Err(StoreError::CapacityExceeded(id));
        }

        let event = &mut self.events[index];
        if let Some(day) = patch.day {
            event.day = day;
        }
        event.start = start;
        event.end = end;
        if let Some(occupants) = patch.occupants {
            event.occupants = occupants;
        }
        Ok(())
    }

    /// Moves one occupant between two events in a single update: removed from
    /// `from`, appended to `to`, and every copy of the occupant's enrollment
    /// in the store has `from` swapped for `to`.
    pub fn move_occupant(
        &mut self,
        from: EventId,
        to: EventId,
        occupant_id: u64,
    ) -> Result<(), StoreError> {
        let from_index = self.index_of(from)?;
        let to_index = self.index_of(to)?;
        let position = self.events[from_index]
            .occupants
            .iter()
            .position(|o| o.id == occupant_id)
            .ok_or(StoreError::OccupantNotFound {
                event: from,
                occupant: occupant_id,
            })?;
        if self.events[to_index].is_full() {
            return Err(StoreError::CapacityExceeded(to));
        }

        let occupant = self.events[from_index].occupants.remove(position);
        self.events[to_index].occupants.push(occupant);

        if let (Some(from_class), Some(to_class)) = (from.class_id(), to.class_id()) {
            for event in &mut self.events {
                for entry in event.occupants.iter_mut().filter(|o| o.id == occupant_id) {
                    if let Some(enrollment) = entry.enrollment.as_mut() {
                        enrollment.class_ids.retain(|id| *id != from_class);
                        if !enrollment.class_ids.contains(&to_class) {
                            enrollment.class_ids.push(to_class);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn snapshot(&self, ids: &[EventId]) -> Result<Snapshot, StoreError> {
        let mut events = Vec::with_capacity(ids.len());
        for id in ids {
            if events.iter().any(|e: &ScheduleEvent| e.id == *id) {
                continue;
            }
            let event = self.get(*id).ok_or(StoreError::EventNotFound(*id))?;
            events.push(event.clone());
        }
        Ok(Snapshot { events })
    }

    /// Puts every captured event back verbatim. Nothing is written unless all
    /// captured events are still present.
    ///
    /// No range or capacity checks: a snapshot was taken from this store, and
    /// loaded classes may already hold more occupants than their capacity.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let indices = snapshot
            .events
            .iter()
            .map(|e| self.index_of(e.id))
            .collect::<Result<Vec<_>, _>>()?;
        for (index, event) in indices.into_iter().zip(&snapshot.events) {
            self.events[index] = event.clone();
        }
        Ok(())
    }

    fn index_of(&self, id: EventId) -> Result<usize, StoreError> {
        self.events
            .iter()
            .position(|e| e.id == id)
            .ok_or(StoreError::EventNotFound(id))
    }
}
