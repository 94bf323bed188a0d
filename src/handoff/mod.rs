//! Agent handoff module
//!
//! Lifecycle of a unit of work transferred from one agent to another:
//! creation, acceptance or rejection, execution, completion or failure.
//!
//! - [`HandoffManager`]: sequential, single-owner manager
//! - [`ConcurrentHandoffManager`]: shared manager with per-record locks and
//!   transition events
//! - [`Transition`]: the state machine both managers apply

mod concurrent;
mod events;
mod lifecycle;
mod manager;
mod store;
mod types;

pub use concurrent::ConcurrentHandoffManager;
pub use events::{
    EventEmitter, EventSink, HandoffEvent, HandoffEventKind, DEFAULT_EVENT_CHANNEL_CAPACITY,
};
pub use lifecycle::{Transition, ACCEPT_REASON};
pub use manager::HandoffManager;
pub use store::RecordStore;
pub use types::{HandoffRecord, HandoffRequest, HandoffResponse, HandoffStatus, Payload, Priority};
