pub mod event;
pub mod lanes;
pub mod overlap;
pub mod time_model;
pub mod weekday;

pub use event::{Enrollment, EventId, EventKind, Occupant, ScheduleEvent};
pub use lanes::{LaneMap, LanePlacement, assign_lanes, column_width, max_lane_count};
pub use overlap::overlaps;
pub use time_model::{ClockTime, TimeParseError};
