pub mod week_view;

pub use week_view::{DayColumn, EventCard, HourRow, WeekLayout, calculate_layout};
