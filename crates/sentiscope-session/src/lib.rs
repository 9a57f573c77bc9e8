//! Mode orchestration and the user-facing classification session.

pub mod orchestrator;
pub mod session;

#[cfg(test)]
mod testing;

pub use orchestrator::{EngineState, ModeChange, Orchestrator, TaggedResult};
pub use session::{Outcome, Session};
