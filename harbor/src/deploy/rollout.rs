//! State machine deciding the outcome of a swarm rollout

use swarm_api::{ServiceUpdateStatus, UpdateState};

use crate::deploy::progress;

/// Terminal result reported by the swarm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutOutcome {
    /// Update completed
    Completed,

    /// Update paused
    Paused,

    /// Rollback paused
    RollbackPaused,

    /// Rollback completed
    RolledBack,
}

/// Result of feeding one observation to the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Same state as before, or no update status at all
    Unchanged,

    /// Non-terminal state, keep polling
    Progressing(UpdateState),

    /// The update failed and the swarm started rolling back
    RollingBack { message: String },

    /// `rollback_completed` not preceded by a rollback in this call
    StaleRollback,

    /// Terminal state reached
    Done(RolloutOutcome),
}

impl Transition {
    /// Progress line for this transition, if any
    pub fn line(&self, service: &str) -> Option<String> {
        let text = match self {
            Transition::Unchanged | Transition::Progressing(_) | Transition::StaleRollback => {
                return None
            }
            Transition::RollingBack { message } => format!(
                "service '{}' update failed, rolling back. message: {}",
                service, message
            ),
            Transition::Done(RolloutOutcome::Completed) => {
                format!("service '{}' updated successfully.", service)
            }
            Transition::Done(RolloutOutcome::Paused) => {
                format!("service '{}' update paused.", service)
            }
            Transition::Done(RolloutOutcome::RollbackPaused) => {
                format!("service '{}' rollback paused.", service)
            }
            Transition::Done(RolloutOutcome::RolledBack) => {
                format!("service '{}' rolled back successfully.", service)
            }
        };
        Some(progress::harbor(text))
    }
}

/// Tracks the update states observed during one wait.
///
/// Starts with no previous state. A `rollback_completed` status is terminal
/// once this tracker has seen the rollout in progress (`updating` or
/// `rollback_started`), or right after `rollback_paused`. Seen before any of
/// those it is left over from an earlier deploy.
#[derive(Debug, Clone, Default)]
pub struct RolloutTracker {
    last: Option<UpdateState>,

    /// An `updating` or `rollback_started` state was observed
    seen_in_progress: bool,
}

impl RolloutTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last state observed, if any
    pub fn last(&self) -> Option<UpdateState> {
        self.last
    }

    /// Feed the update status of one poll
    pub fn observe(&mut self, status: Option<&ServiceUpdateStatus>) -> Transition {
        let Some((state, message)) =
            status.and_then(|s| s.state.map(|state| (state, s.message.as_str())))
        else {
            return Transition::Unchanged;
        };

        if self.last == Some(state) {
            return Transition::Unchanged;
        }

        let previous = self.last.replace(state);
        if matches!(state, UpdateState::Updating | UpdateState::RollbackStarted) {
            self.seen_in_progress = true;
        }

        match state {
            UpdateState::Completed => Transition::Done(RolloutOutcome::Completed),
            UpdateState::Paused => Transition::Done(RolloutOutcome::Paused),
            UpdateState::RollbackPaused => Transition::Done(RolloutOutcome::RollbackPaused),
            UpdateState::RollbackStarted => Transition::RollingBack {
                message: message.to_string(),
            },
            UpdateState::RollbackCompleted
                if self.seen_in_progress || previous == Some(UpdateState::RollbackPaused) =>
            {
                Transition::Done(RolloutOutcome::RolledBack)
            }
            UpdateState::RollbackCompleted => Transition::StaleRollback,
            UpdateState::Updating | UpdateState::Unknown => Transition::Progressing(state),
        }
    }
}
