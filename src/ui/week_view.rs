use chrono::Weekday;

use crate::schedule::time_model::{height_for_duration, offset_within_hour};
use crate::schedule::weekday::{week_days, weekday_code};
use crate::schedule::{ClockTime, EventId, EventKind, LanePlacement, ScheduleEvent};
use crate::schedule::{assign_lanes, column_width, max_lane_count};
use crate::storage::config::GridConfig;
use crate::storage::event_store::ScheduleEventStore;

#[derive(Debug, Clone, PartialEq)]
pub struct WeekLayout {
    pub first_hour: u32,
    pub last_hour: u32,
    pub days: Vec<DayColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayColumn {
    pub day: Weekday,
    pub code: &'static str,
    pub width: f64,
    pub lane_count: usize,
    pub hours: Vec<HourRow>,
}

/// One hour cell of a day column. Cards are anchored in the row their event
/// starts in and may extend below it.
#[derive(Debug, Clone, PartialEq)]
pub struct HourRow {
    pub hour: u32,
    pub cards: Vec<EventCard>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventCard {
    pub event_id: EventId,
    pub title: String,
    pub kind: EventKind,
    pub start: ClockTime,
    pub end: ClockTime,
    /// Percent of the hour cell, from its top.
    pub top_percent: f64,
    /// Percent of one hour cell; above 100 for events longer than an hour.
    pub height_percent: f64,
    pub lane: usize,
    pub lane_count: usize,
    pub left_percent: f64,
    pub width_percent: f64,
    pub draggable: bool,
    pub occupied: usize,
    pub capacity: u32,
}

impl WeekLayout {
    pub fn day(&self, day: Weekday) -> Option<&DayColumn> {
        self.days.iter().find(|column| column.day == day)
    }

    pub fn card(&self, id: EventId) -> Option<&EventCard> {
        self.days
            .iter()
            .flat_map(|column| column.hours.iter())
            .flat_map(|row| row.cards.iter())
            .find(|card| card.event_id == id)
    }
}

/// Builds the grid for the week held in `store`.
///
/// Rows cover the configured hours, widened to include any event starting
/// earlier or later. Days follow `grid.first_weekday()`.
pub fn calculate_layout(store: &ScheduleEventStore, grid: &GridConfig) -> WeekLayout {
    let (first_hour, last_hour) = hour_range(store, grid);

    let days = week_days(grid.first_weekday())
        .into_iter()
        .map(|day| build_day_column(store, grid, day, first_hour, last_hour))
        .collect();

    WeekLayout {
        first_hour,
        last_hour,
        days,
    }
}

fn hour_range(store: &ScheduleEventStore, grid: &GridConfig) -> (u32, u32) {
    let starts = store.events().iter().map(|event| event.start.hour());
    let earliest = starts.clone().min().unwrap_or(grid.first_hour);
    let latest = starts.max().unwrap_or(grid.last_hour);

    let first = grid.first_hour.min(earliest).min(23);
    let last = grid.last_hour.max(latest).clamp(first, 23);
    (first, last)
}

fn build_day_column(
    store: &ScheduleEventStore,
    grid: &GridConfig,
    day: Weekday,
    first_hour: u32,
    last_hour: u32,
) -> DayColumn {
    let lanes = assign_lanes(store.events_for_day(day));
    let lane_count = max_lane_count(&lanes);

    let hours = (first_hour..=last_hour)
        .map(|hour| {
            let cards = store
                .events_starting_in_hour_bucket(day, hour)
                .into_iter()
                .map(|event| {
                    let placement = lanes.get(&event.id).copied().unwrap_or(LanePlacement {
                        lane: 0,
                        lane_count: 1,
                    });
                    build_card(event, hour, placement)
                })
                .collect();
            HourRow { hour, cards }
        })
        .collect();

    DayColumn {
        day,
        code: weekday_code(day),
        width: column_width(grid.base_column_width, grid.lane_width_increment, lane_count),
        lane_count,
        hours,
    }
}

fn build_card(event: &ScheduleEvent, hour: u32, placement: LanePlacement) -> EventCard {
    EventCard {
        event_id: event.id,
        title: event.title.clone(),
        kind: event.kind(),
        start: event.start,
        end: event.end,
        top_percent: offset_within_hour(event.start, ClockTime::from_hm(hour, 0)),
        height_percent: height_for_duration(event.start, event.end),
        lane: placement.lane,
        lane_count: placement.lane_count,
        left_percent: placement.left_percent(),
        width_percent: placement.width_percent(),
        draggable: event.is_draggable(),
        occupied: event.occupants.len(),
        capacity: event.capacity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Occupant;

    fn t(input: &str) -> ClockTime {
        ClockTime::parse(input).unwrap()
    }

    fn create_event(id: EventId, day: Weekday, start: &str, end: &str) -> ScheduleEvent {
        ScheduleEvent {
            id,
            title: format!("Event {}", id),
            day,
            start: t(start),
            end: t(end),
            capacity: 10,
            occupants: vec![],
        }
    }

    fn create_test_store() -> ScheduleEventStore {
        ScheduleEventStore::from_events(vec![
            create_event(EventId::Class(1), Weekday::Mon, "10:00", "11:00"),
            create_event(EventId::Class(2), Weekday::Mon, "10:30", "11:30"),
            create_event(EventId::Rental(3), Weekday::Mon, "10:45", "12:00"),
            create_event(EventId::Class(4), Weekday::Thu, "18:15", "19:45"),
        ])
    }

    #[test]
    fn week_layout_has_seven_days_from_configured_start() {
        let grid = GridConfig {
            first_day_of_week: "Sunday".to_string(),
            ..GridConfig::default()
        };

        let layout = calculate_layout(&create_test_store(), &grid);

        assert_eq!(layout.days.len(), 7);
        assert_eq!(layout.days[0].day, Weekday::Sun);
        assert_eq!(layout.days[0].code, "dom");
        assert_eq!(layout.days[6].day, Weekday::Sat);
    }

    #[test]
    fn rows_cover_configured_hours() {
        let layout = calculate_layout(&create_test_store(), &GridConfig::default());

        let monday = layout.day(Weekday::Mon).unwrap();
        assert_eq!(layout.first_hour, 6);
        assert_eq!(layout.last_hour, 22);
        assert_eq!(monday.hours.len(), 17);
        assert_eq!(monday.hours[0].hour, 6);
    }

    #[test]
    fn rows_widen_for_early_and_late_events() {
        let store = ScheduleEventStore::from_events(vec![
            create_event(EventId::Class(1), Weekday::Tue, "05:30", "06:30"),
            create_event(EventId::Class(2), Weekday::Wed, "23:00", "23:59"),
        ]);

        let layout = calculate_layout(&store, &GridConfig::default());

        assert_eq!(layout.first_hour, 5);
        assert_eq!(layout.last_hour, 23);
    }

    #[test]
    fn cards_sit_in_their_start_hour() {
        let layout = calculate_layout(&create_test_store(), &GridConfig::default());

        let thursday = layout.day(Weekday::Thu).unwrap();
        let row = thursday.hours.iter().find(|row| row.hour == 18).unwrap();
        assert_eq!(row.cards.len(), 1);
        let card = &row.cards[0];
        assert_eq!(card.top_percent, 25.0);
        assert_eq!(card.height_percent, 150.0);
        assert_eq!(card.width_percent, 100.0);
        assert!(card.draggable);
    }

    #[test]
    fn overlapping_cards_split_the_column() {
        let layout = calculate_layout(&create_test_store(), &GridConfig::default());

        let monday = layout.day(Weekday::Mon).unwrap();
        assert_eq!(monday.lane_count, 3);
        assert_eq!(monday.width, 140.0 + 2.0 * 70.0);

        let rental = layout.card(EventId::Rental(3)).unwrap();
        assert_eq!(rental.lane, 2);
        assert_eq!(rental.lane_count, 3);
        assert!(!rental.draggable);
        assert!((rental.left_percent - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_days_keep_base_width() {
        let layout = calculate_layout(&create_test_store(), &GridConfig::default());

        let sunday = layout.day(Weekday::Sun).unwrap();
        assert_eq!(sunday.lane_count, 1);
        assert_eq!(sunday.width, 140.0);
        assert!(sunday.hours.iter().all(|row| row.cards.is_empty()));
    }

    #[test]
    fn card_reports_occupancy() {
        let mut event = create_event(EventId::Class(9), Weekday::Fri, "08:00", "09:00");
        event.occupants = vec![
            Occupant::student(1, "Ana", None),
            Occupant::makeup(2, "Bia"),
        ];
        let store = ScheduleEventStore::from_events(vec![event]);

        let layout = calculate_layout(&store, &GridConfig::default());

        let card = layout.card(EventId::Class(9)).unwrap();
        assert_eq!(card.occupied, 2);
        assert_eq!(card.capacity, 10);
    }
}
