//! ABOUTME: Engine facade: one constructible value bundling the planner, runner, executor, and rollback controller
//! ABOUTME: Replaces module-level executor/runner/controller singletons with a builder-produced value

mod builder;
mod engine;
mod error;

pub use builder::EngineBuilder;
pub use engine::Engine;
pub use error::EngineError;

pub mod prelude {
    pub use crate::{Engine, EngineBuilder, EngineError};
}
