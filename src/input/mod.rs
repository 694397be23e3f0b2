pub mod drag_drop;

pub use drag_drop::{
    DragDropController, DragError, DragSource, DropOutcome, DropTarget, GesturePhase,
    GestureTicket, Notice, NoticeLevel, Resolution,
};
