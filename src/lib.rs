pub mod input;
pub mod schedule;
pub mod storage;
pub mod sync;
pub mod ui;

pub use input::{DragDropController, DragError, DropOutcome, DropTarget, Notice, Resolution};
pub use schedule::{ClockTime, EventId, ScheduleEvent};
pub use storage::{ScheduleEventStore, SharedStore};
