use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};
use thiserror::Error;

use crate::schedule::weekday::weekday_from_code;
use crate::schedule::{ClockTime, Enrollment, EventId, Occupant, ScheduleEvent, TimeParseError};
use crate::storage::event_store::{SharedStore, lock_store};
use crate::sync::gateway::{
    BackendGateway, ClassRecord, DateRange, GatewayError, PeriodPayload, RentalRecord,
    StudentRecord,
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Error, PartialEq)]
enum RecordError {
    #[error("unknown weekday code '{0}'")]
    UnknownWeekday(String),
    #[error("bad time: {0}")]
    Time(#[from] TimeParseError),
    #[error("end {end} is not after start {start}")]
    EmptyRange { start: ClockTime, end: ClockTime },
}

/// Populates the schedule store from the backend, one week at a time.
pub struct PeriodLoader {
    gateway: Arc<dyn BackendGateway>,
    first_day: Weekday,
}

impl PeriodLoader {
    pub fn new(gateway: Arc<dyn BackendGateway>, first_day: Weekday) -> Self {
        Self { gateway, first_day }
    }

    pub fn week_of(&self, date: NaiveDate) -> DateRange {
        DateRange::week_containing(date, self.first_day)
    }

    pub async fn load(&self, range: &DateRange) -> Result<Vec<ScheduleEvent>, LoadError> {
        let payload = self.gateway.fetch_period(range).await?;
        Ok(normalize_period(payload, range))
    }

    /// Fetches the week containing `date` and replaces the store's contents.
    pub async fn refresh_week(
        &self,
        store: &SharedStore,
        date: NaiveDate,
    ) -> Result<DateRange, LoadError> {
        let range = self.week_of(date);
        let events = self.load(&range).await?;
        tracing::info!(
            "Loaded {} schedule events for {} to {}",
            events.len(),
            range.start,
            range.end
        );
        lock_store(store).replace_all(events);
        Ok(range)
    }
}

/// Builds grid events from raw records. Records that cannot be placed are
/// logged and skipped; rentals dated outside `range` are dropped.
pub fn normalize_period(payload: PeriodPayload, range: &DateRange) -> Vec<ScheduleEvent> {
    let mut events = Vec::with_capacity(payload.classes.len() + payload.rentals.len());

    for record in payload.classes {
        let id = record.id;
        match class_event(record, range) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!("Skipping class {}: {}", id, e),
        }
    }

    for record in payload.rentals {
        if !range.contains(record.date) {
            tracing::debug!("Rental {} on {} is outside the period", record.id, record.date);
            continue;
        }
        let id = record.id;
        match rental_event(record) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!("Skipping rental {}: {}", id, e),
        }
    }

    events
}

fn parse_range(start: &str, end: &str) -> Result<(ClockTime, ClockTime), RecordError> {
    let start = ClockTime::parse(start)?;
    let end = ClockTime::parse(end)?;
    if start >= end {
        return Err(RecordError::EmptyRange { start, end });
    }
    Ok((start, end))
}

fn class_event(record: ClassRecord, range: &DateRange) -> Result<ScheduleEvent, RecordError> {
    let day = weekday_from_code(&record.weekday)
        .ok_or_else(|| RecordError::UnknownWeekday(record.weekday.clone()))?;
    let (start, end) = parse_range(&record.start_time, &record.end_time)?;

    let mut occupants: Vec<Occupant> = record.students.into_iter().map(student_occupant).collect();
    occupants.extend(
        record
            .makeups
            .into_iter()
            .filter(|m| range.contains(m.date) && m.date.weekday() == day)
            .map(|m| Occupant::makeup(m.student_id, &m.name)),
    );

    if occupants.len() > record.capacity as usize {
        tracing::warn!(
            "Class {} lists {} occupants for capacity {}",
            record.id,
            occupants.len(),
            record.capacity
        );
    }

    Ok(ScheduleEvent {
        id: EventId::Class(record.id),
        title: record.name,
        day,
        start,
        end,
        capacity: record.capacity,
        occupants,
    })
}

fn student_occupant(record: StudentRecord) -> Occupant {
    let enrollment = match (record.enrollment_id, record.event_ids) {
        (Some(id), Some(class_ids)) => Some(Enrollment { id, class_ids }),
        _ => None,
    };
    Occupant::student(record.id, &record.name, enrollment)
}

fn rental_event(record: RentalRecord) -> Result<ScheduleEvent, RecordError> {
    let (start, end) = parse_range(&record.start_time, &record.end_time)?;
    Ok(ScheduleEvent {
        id: EventId::Rental(record.id),
        title: record.customer,
        day: record.date.weekday(),
        start,
        end,
        capacity: 0,
        occupants: vec![],
    })
}
