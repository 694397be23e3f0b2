use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::overlap;
use super::time_model::ClockTime;

/// Identifier of a grid occupant.
///
/// Classes recur weekly and keep their backend id across periods. Rentals are
/// tied to one date and live in their own id space so the two never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventId {
    Class(u64),
    Rental(u64),
}

impl EventId {
    pub fn kind(&self) -> EventKind {
        match self {
            EventId::Class(_) => EventKind::Class,
            EventId::Rental(_) => EventKind::Rental,
        }
    }

    pub fn class_id(&self) -> Option<u64> {
        match self {
            EventId::Class(id) => Some(*id),
            EventId::Rental(_) => None,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventId::Class(id) => write!(f, "{}", id),
            EventId::Rental(id) => write!(f, "rental-{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Class,
    Rental,
}

/// Reference to the occupant's roster record on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: u64,
    pub class_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub id: u64,
    pub name: String,
    pub transferable: bool,
    pub enrollment: Option<Enrollment>,
}

impl Occupant {
    pub fn student(id: u64, name: &str, enrollment: Option<Enrollment>) -> Self {
        Self {
            id,
            name: name.to_string(),
            transferable: true,
            enrollment,
        }
    }

    pub fn makeup(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            transferable: false,
            enrollment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub id: EventId,
    pub title: String,
    pub day: Weekday,
    pub start: ClockTime,
    pub end: ClockTime,
    pub capacity: u32,
    pub occupants: Vec<Occupant>,
}

impl ScheduleEvent {
    pub fn kind(&self) -> EventKind {
        self.id.kind()
    }

    pub fn is_draggable(&self) -> bool {
        self.kind() == EventKind::Class
    }

    pub fn duration_minutes(&self) -> u32 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }

    pub fn overlaps(&self, other: &ScheduleEvent) -> bool {
        overlap::overlaps(self, other)
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() >= self.capacity as usize
    }

    pub fn occupant(&self, occupant_id: u64) -> Option<&Occupant> {
        self.occupants.iter().find(|o| o.id == occupant_id)
    }

    /// Regular (transferable) roster membership, makeup visits excluded.
    pub fn has_member(&self, occupant_id: u64) -> bool {
        self.occupants
            .iter()
            .any(|o| o.id == occupant_id && o.transferable)
    }
}
