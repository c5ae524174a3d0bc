// Library crate: the placement core, its capability boundaries, and the
// headless harness used by the integration tests and the scenario CLI.

pub mod command;
pub mod error;
pub mod fixtures;
pub mod gesture;
pub mod harness;
pub mod loader;
pub mod orchestrator;
pub mod platform;
pub mod state;
pub mod ui;
pub mod viewport;

pub use error::ArError;
pub use orchestrator::{ActionOutcome, ArEvent, IgnoreReason, Orchestrator};
