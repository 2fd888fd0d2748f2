//! ABOUTME: Shared test fixtures for the agentflow workspace: mock tool registry, scripted oracle, git sandbox
//! ABOUTME: Dev-dependency only -- never linked into a non-test build

pub mod oracle;
pub mod registry;
pub mod vcs;

pub use oracle::ScriptedOracle;
pub use registry::{MockToolRegistry, RecordedCall};
pub use vcs::GitSandbox;

pub mod prelude {
    pub use crate::{GitSandbox, MockToolRegistry, RecordedCall, ScriptedOracle};
}
