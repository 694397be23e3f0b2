//! Drag-and-drop mutations of the weekly schedule.
//!
//! One gesture runs `Idle -> Dragging -> Validating` and then either
//! `Rejected -> Idle` (nothing written) or `OptimisticApplied -> Idle`, with
//! the backend call resolving later to `Committed` or `RolledBack`. Dropping
//! outside a valid target goes straight back to `Idle`.
//!
//! Preconditions run under the same store lock as the optimistic write, so a
//! rejected drop never leaves a trace. Every applied drop captures the
//! affected events before and after its write; on failure the "before" copy
//! is restored only if the "after" copy is still what the store holds.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::Weekday;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::schedule::time_model::{clamp_to_day_end, shift_preserving_duration};
use crate::schedule::{ClockTime, EventId, EventKind};
use crate::storage::event_store::{EventPatch, SharedStore, Snapshot, StoreError, lock_store};
use crate::sync::gateway::{BackendGateway, GatewayError, RescheduleRequest, RosterUpdate};
use crate::sync::persistence_queue::{PersistKey, PersistenceQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Dragging,
    Validating,
    Rejected,
    OptimisticApplied,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSource {
    Event(EventId),
    Occupant { event: EventId, occupant: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Slot { day: Weekday, start: ClockTime },
    Event(EventId),
    Outside,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DragError {
    #[error("Another drag is already in progress")]
    AlreadyDragging,
    #[error("No drag in progress")]
    NotDragging,
    #[error("Rentals cannot be moved")]
    RentalNotDraggable,
    #[error("This attendee cannot be transferred")]
    NotTransferable,
    #[error("Class {0} is no longer on the schedule, reload the view")]
    UnknownEvent(EventId),
    #[error("Student {occupant} is no longer in class {event}, reload the view")]
    UnknownOccupant { event: EventId, occupant: u64 },
    #[error("Missing membership data, reload the view")]
    MissingMembership,
    #[error("Class is full")]
    ClassFull,
    #[error("Student is already enrolled in this class")]
    AlreadyEnrolled,
    #[error("Student already attends this class as a makeup")]
    AlreadyAttending,
    #[error("A class cannot start at {0}")]
    InvalidSlot(ClockTime),
    #[error("Schedule update failed: {0}")]
    Store(#[from] StoreError),
}

/// How a gesture's backend call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Committed,
    RolledBack,
    /// The call failed but a later gesture had already rewritten the same
    /// events, so nothing was restored.
    Diverged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// User-facing message about one gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub gesture: Uuid,
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug)]
pub struct GestureTicket {
    id: Uuid,
    handle: JoinHandle<Resolution>,
}

impl GestureTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn resolution(self) -> Result<Resolution, JoinError> {
        self.handle.await
    }
}

#[derive(Debug)]
pub enum DropOutcome {
    Cancelled,
    Applied(GestureTicket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    MoveClass,
    TransferStudent,
}

impl Operation {
    fn failure_message(&self) -> &'static str {
        match self {
            Operation::MoveClass => "Could not move class",
            Operation::TransferStudent => "Could not transfer student",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::MoveClass => write!(f, "move class"),
            Operation::TransferStudent => write!(f, "transfer student"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveDrag {
    gesture: Uuid,
    source: DragSource,
}

struct PendingWrite {
    before: Snapshot,
    after: Snapshot,
}

/// Range of a class moved to `new_start`: same length, end clamped to 23:59.
/// `None` when the clamped class would be empty.
pub fn rescheduled_range(
    start: ClockTime,
    end: ClockTime,
    new_start: ClockTime,
) -> Option<(ClockTime, ClockTime)> {
    let new_end = clamp_to_day_end(shift_preserving_duration(start, end, new_start));
    (new_start < new_end).then_some((new_start, new_end))
}

pub struct DragDropController {
    store: SharedStore,
    gateway: Arc<dyn BackendGateway>,
    queue: PersistenceQueue,
    notices: mpsc::UnboundedSender<Notice>,
    active: Option<ActiveDrag>,
}

impl DragDropController {
    pub fn new(
        store: SharedStore,
        gateway: Arc<dyn BackendGateway>,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notices, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            store,
            gateway,
            queue: PersistenceQueue::new(),
            notices,
            active: None,
        };
        (controller, receiver)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Synchronous state only: `Dragging` while a drag is held, `Idle`
    /// otherwise. Validation finishes inside `drop_on`, and the backend
    /// outcome of an applied drop arrives through its [`GestureTicket`].
    pub fn phase(&self) -> GesturePhase {
        if self.active.is_some() {
            GesturePhase::Dragging
        } else {
            GesturePhase::Idle
        }
    }

    pub fn dragging(&self) -> Option<DragSource> {
        self.active.map(|active| active.source)
    }

    pub fn begin_event_drag(&mut self, id: EventId) -> Result<(), DragError> {
        if self.active.is_some() {
            return Err(DragError::AlreadyDragging);
        }
        {
            let store = lock_store(&self.store);
            let event = store.get(id).ok_or(DragError::UnknownEvent(id))?;
            if !event.is_draggable() {
                return Err(DragError::RentalNotDraggable);
            }
        }
        self.start(DragSource::Event(id));
        Ok(())
    }

    pub fn begin_occupant_drag(&mut self, event: EventId, occupant: u64) -> Result<(), DragError> {
        if self.active.is_some() {
            return Err(DragError::AlreadyDragging);
        }
        {
            let store = lock_store(&self.store);
            let source = store.get(event).ok_or(DragError::UnknownEvent(event))?;
            let entry = source
                .occupant(occupant)
                .ok_or(DragError::UnknownOccupant { event, occupant })?;
            if !entry.transferable {
                return Err(DragError::NotTransferable);
            }
        }
        self.start(DragSource::Occupant { event, occupant });
        Ok(())
    }

    /// Pointer released outside any target. Touches nothing.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            log_transition(active.gesture, GesturePhase::Dragging, GesturePhase::Idle);
        }
    }

    pub fn drop_on(&mut self, target: DropTarget) -> Result<DropOutcome, DragError> {
        let active = self.active.take().ok_or(DragError::NotDragging)?;
        let gesture = active.gesture;

        let applied = match (active.source, target) {
            (DragSource::Event(id), DropTarget::Slot { day, start }) => {
                log_transition(gesture, GesturePhase::Dragging, GesturePhase::Validating);
                self.apply_move(gesture, id, day, start)
            }
            (DragSource::Occupant { event, occupant }, DropTarget::Event(to))
                if to != event && to.kind() == EventKind::Class =>
            {
                log_transition(gesture, GesturePhase::Dragging, GesturePhase::Validating);
                self.apply_transfer(gesture, event, to, occupant)
            }
            _ => {
                log_transition(gesture, GesturePhase::Dragging, GesturePhase::Idle);
                return Ok(DropOutcome::Cancelled);
            }
        };

        match applied {
            Ok(ticket) => {
                log_transition(gesture, GesturePhase::OptimisticApplied, GesturePhase::Idle);
                Ok(DropOutcome::Applied(ticket))
            }
            Err(err) => {
                log_transition(gesture, GesturePhase::Validating, GesturePhase::Rejected);
                tracing::warn!("Gesture {} rejected: {}", gesture, err);
                self.notify(Notice {
                    gesture,
                    level: NoticeLevel::Warning,
                    message: err.to_string(),
                });
                log_transition(gesture, GesturePhase::Rejected, GesturePhase::Idle);
                Err(err)
            }
        }
    }

    fn start(&mut self, source: DragSource) {
        let gesture = Uuid::new_v4();
        tracing::debug!("Gesture {} started on {:?}", gesture, source);
        log_transition(gesture, GesturePhase::Idle, GesturePhase::Dragging);
        self.active = Some(ActiveDrag { gesture, source });
    }

    fn apply_move(
        &self,
        gesture: Uuid,
        id: EventId,
        day: Weekday,
        start: ClockTime,
    ) -> Result<GestureTicket, DragError> {
        let (class_id, request, pending) = {
            let mut store = lock_store(&self.store);
            let event = store.get(id).ok_or(DragError::UnknownEvent(id))?;
            let class_id = id.class_id().ok_or(DragError::RentalNotDraggable)?;
            let (start, end) = rescheduled_range(event.start, event.end, start)
                .ok_or(DragError::InvalidSlot(start))?;

            let before = store.snapshot(&[id])?;
            store.patch_event(id, EventPatch::reschedule(day, start, end))?;
            let after = store.snapshot(&[id])?;

            (
                class_id,
                RescheduleRequest::new(day, start, end),
                PendingWrite { before, after },
            )
        };
        log_transition(gesture, GesturePhase::Validating, GesturePhase::OptimisticApplied);
        tracing::info!(
            "Gesture {} moved class {} to {} {}-{}",
            gesture,
            class_id,
            request.weekday,
            request.start_time,
            request.end_time
        );

        let gateway = Arc::clone(&self.gateway);
        let call = async move { gateway.reschedule_event(class_id, &request).await };
        Ok(self.persist(gesture, PersistKey::Class(class_id), Operation::MoveClass, pending, call))
    }

    fn apply_transfer(
        &self,
        gesture: Uuid,
        from: EventId,
        to: EventId,
        occupant_id: u64,
    ) -> Result<GestureTicket, DragError> {
        let (enrollment_id, update, pending) = {
            let mut store = lock_store(&self.store);
            let source = store.get(from).ok_or(DragError::UnknownEvent(from))?;
            let target = store.get(to).ok_or(DragError::UnknownEvent(to))?;
            let occupant = source.occupant(occupant_id).ok_or(DragError::UnknownOccupant {
                event: from,
                occupant: occupant_id,
            })?;
            if !occupant.transferable {
                return Err(DragError::NotTransferable);
            }
            let enrollment = occupant
                .enrollment
                .as_ref()
                .ok_or(DragError::MissingMembership)?;
            let (from_class, to_class) = from
                .class_id()
                .zip(to.class_id())
                .ok_or(DragError::UnknownEvent(to))?;
            if target.is_full() {
                return Err(DragError::ClassFull);
            }
            if enrollment.class_ids.contains(&to_class) || target.has_member(occupant_id) {
                return Err(DragError::AlreadyEnrolled);
            }
            if target.occupant(occupant_id).is_some() {
                return Err(DragError::AlreadyAttending);
            }
            let enrollment_id = enrollment.id;

            let mut event_ids = store.memberships_of(occupant_id);
            event_ids.retain(|id| *id != from_class);
            event_ids.push(to_class);
            event_ids.sort_unstable();
            event_ids.dedup();

            let mut affected = vec![from, to];
            affected.extend(store.events_with_occupant(occupant_id));
            let before = store.snapshot(&affected)?;
            store.move_occupant(from, to, occupant_id)?;
            let after = store.snapshot(&affected)?;

            (enrollment_id, RosterUpdate { event_ids }, PendingWrite { before, after })
        };
        log_transition(gesture, GesturePhase::Validating, GesturePhase::OptimisticApplied);
        tracing::info!(
            "Gesture {} transferred student {} from {} to {}",
            gesture,
            occupant_id,
            from,
            to
        );

        let gateway = Arc::clone(&self.gateway);
        let call = async move { gateway.update_roster(enrollment_id, &update).await };
        Ok(self.persist(
            gesture,
            PersistKey::Occupant(occupant_id),
            Operation::TransferStudent,
            pending,
            call,
        ))
    }

    fn persist<F>(
        &self,
        gesture: Uuid,
        key: PersistKey,
        operation: Operation,
        pending: PendingWrite,
        call: F,
    ) -> GestureTicket
    where
        F: Future<Output = Result<(), GatewayError>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let notices = self.notices.clone();
        let handle = self.queue.enqueue(key, async move {
            match call.await {
                Ok(()) => {
                    log_transition(gesture, GesturePhase::OptimisticApplied, GesturePhase::Committed);
                    tracing::info!("Gesture {} committed ({})", gesture, operation);
                    Resolution::Committed
                }
                Err(err) => roll_back(gesture, operation, &store, &pending, &err, &notices),
            }
        });
        GestureTicket { id: gesture, handle }
    }

    fn notify(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            tracing::debug!("Notice dropped, no listener");
        }
    }
}

fn roll_back(
    gesture: Uuid,
    operation: Operation,
    store: &SharedStore,
    pending: &PendingWrite,
    error: &GatewayError,
    notices: &mpsc::UnboundedSender<Notice>,
) -> Resolution {
    tracing::warn!("Gesture {} failed to {}: {}", gesture, operation, error);

    let (resolution, message) = {
        let mut store = lock_store(store);
        if !pending.after.is_current_in(&store) {
            (
                Resolution::Diverged,
                format!(
                    "{}; the schedule changed while saving, reload the view",
                    operation.failure_message()
                ),
            )
        } else {
            match store.restore(&pending.before) {
                Ok(()) => (
                    Resolution::RolledBack,
                    format!("{}: {}", operation.failure_message(), error),
                ),
                Err(e) => {
                    tracing::error!("Gesture {} could not be restored: {}", gesture, e);
                    (
                        Resolution::Diverged,
                        format!("{}, reload the view", operation.failure_message()),
                    )
                }
            }
        }
    };

    match resolution {
        Resolution::RolledBack => {
            log_transition(gesture, GesturePhase::OptimisticApplied, GesturePhase::RolledBack);
        }
        _ => tracing::warn!("Gesture {} left unrestored", gesture),
    }

    let notice = Notice {
        gesture,
        level: NoticeLevel::Error,
        message,
    };
    if notices.send(notice).is_err() {
        tracing::debug!("Notice dropped, no listener");
    }
    resolution
}

fn log_transition(gesture: Uuid, from: GesturePhase, to: GesturePhase) {
    tracing::debug!("Gesture {}: {:?} -> {:?}", gesture, from, to);
}
