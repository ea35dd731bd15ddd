//! Run state machine.

use std::fmt;

use ecicep_qa_core::{QaError, Result};

/// Progress of one regression run.
///
/// Steps only move forward, one at a time. `Failed` can be entered from any
/// non-terminal state and is itself terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotLoggedIn,
    LoggedIn,
    Scenario1Done,
    Scenario2Done,
    Scenario3Verified,
    Reported,
    Failed,
}

impl RunState {
    fn next(self) -> Option<RunState> {
        match self {
            RunState::NotLoggedIn => Some(RunState::LoggedIn),
            RunState::LoggedIn => Some(RunState::Scenario1Done),
            RunState::Scenario1Done => Some(RunState::Scenario2Done),
            RunState::Scenario2Done => Some(RunState::Scenario3Verified),
            RunState::Scenario3Verified => Some(RunState::Reported),
            RunState::Reported | RunState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Reported | RunState::Failed)
    }

    /// Moves to `to` if it is the immediate successor of `self`.
    pub fn advance(self, to: RunState) -> Result<RunState> {
        if self.next() == Some(to) {
            Ok(to)
        } else {
            Err(QaError::InvalidState(format!(
                "cannot move from {} to {}",
                self, to
            )))
        }
    }

    /// Moves to `Failed`; a finished run cannot fail afterwards.
    pub fn fail(self) -> Result<RunState> {
        if self.is_terminal() {
            Err(QaError::InvalidState(format!("cannot fail from {}", self)))
        } else {
            Ok(RunState::Failed)
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::NotLoggedIn => "not-logged-in",
            RunState::LoggedIn => "logged-in",
            RunState::Scenario1Done => "scenario-1-done",
            RunState::Scenario2Done => "scenario-2-done",
            RunState::Scenario3Verified => "scenario-3-verified",
            RunState::Reported => "reported",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}
