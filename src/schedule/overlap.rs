use super::event::ScheduleEvent;

/// Half-open `[start, end)` intersection on the same weekday. Events that only
/// touch at an endpoint do not overlap.
pub fn overlaps(a: &ScheduleEvent, b: &ScheduleEvent) -> bool {
    if a.day != b.day {
        return false;
    }
    a.start < b.end && b.start < a.end
}
