//! ABOUTME: Workflow event stream: typed events plus an async pub/sub bus
//! ABOUTME: Model events as a typed channel with multiple subscribers (Design Notes section 9)

pub mod bus;
pub mod event;

pub use bus::{EventBus, PublishError};
pub use event::WorkflowEvent;

pub mod prelude {
    pub use crate::{EventBus, PublishError, WorkflowEvent};
}
