//! Ties roster, session, media, mesh and signaling together.
//!
//! [`Coordinator`] is the synchronous core and is what the scenario tests
//! drive directly. [`CallRuntime`] runs one on a tokio task and exposes a
//! [`CallHandle`] to the UI.

mod engine;
mod runtime;
mod types;

pub use engine::Coordinator;
pub use runtime::{CallHandle, CallRuntime};
pub use types::{CallNotice, CallSnapshot, CoordinatorConfig, MediaRequest, ScreenShareAction};
