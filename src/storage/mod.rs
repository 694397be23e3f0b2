pub mod config;
pub mod event_store;

pub use event_store::{EventPatch, ScheduleEventStore, SharedStore, Snapshot, StoreError};
