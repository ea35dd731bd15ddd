//! Independent-save regression runner.
//!
//! Logs in once, then drives the agreement-only, control-only and full-form
//! scenarios in order on the same session. The full form is additionally
//! read back from the database through a [`RecordStore`].

pub mod report;
pub mod runner;
pub mod state;
pub mod store;

pub use report::{Identities, RunReport};
pub use runner::{ScenarioRunner, SCENARIO_AGREEMENT, SCENARIO_CONTROL, SCENARIO_FULL};
pub use state::RunState;
pub use store::RecordStore;
