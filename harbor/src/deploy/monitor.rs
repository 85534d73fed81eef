//! Service update-status polling

use std::sync::Arc;
use std::time::Duration;

use swarm_api::{Task, TaskState};
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::deploy::progress::{self, LineSender};
use crate::deploy::rollout::{RolloutOutcome, RolloutTracker, Transition};
use crate::deploy::scope::CancelScope;
use crate::docker::{ControlPlane, TaskFilter};
use crate::errors::ControlPlaneError;

/// Rollout monitor options
#[derive(Debug, Clone)]
pub struct Options {
    /// Delay between two service inspections
    pub poll_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Single-shot completion signal. Firing twice is a no-op.
#[derive(Debug)]
pub struct DoneSignal {
    tx: Option<oneshot::Sender<RolloutOutcome>>,
}

impl DoneSignal {
    pub fn channel() -> (Self, oneshot::Receiver<RolloutOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Returns false if the signal already fired
    pub fn fire(&mut self, outcome: RolloutOutcome) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // the receiver may be gone if the wait was cancelled
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.tx.is_none()
    }
}

/// Poll the service until its rollout reaches a terminal state or `scope`
/// is cancelled. Makes at most one state change per tick.
pub async fn run(
    client: Arc<dyn ControlPlane>,
    service_id: String,
    options: Options,
    lines: LineSender,
    mut done: DoneSignal,
    scope: CancelScope,
) {
    info!("Rollout monitor starting for service {}", service_id);

    let period = options.poll_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tracker = RolloutTracker::new();

    loop {
        tokio::select! {
            _ = scope.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let inspected = tokio::select! {
            _ = scope.cancelled() => break,
            result = client.inspect_service(&service_id) => result,
        };

        let service = match inspected {
            Ok(service) => service,
            Err(e) => {
                warn!("Failed to inspect service {}: {}", service_id, e);
                progress::emit(
                    &lines,
                    progress::harbor(format!("service inspection error: {}", e)),
                );
                continue;
            }
        };

        let transition = tracker.observe(service.update_status.as_ref());
        if let Some(line) = transition.line(&service.spec.name) {
            progress::emit(&lines, line);
        }

        match transition {
            Transition::Done(outcome) => {
                info!("Rollout of {} finished: {:?}", service.spec.name, outcome);
                done.fire(outcome);
                break;
            }
            Transition::RollingBack { .. } => {
                let lookup = tokio::select! {
                    _ = scope.cancelled() => break,
                    result = latest_task_error(client.as_ref(), &service_id) => result,
                };
                match lookup {
                    Ok(Some(err)) => {
                        progress::emit(&lines, progress::harbor(format!("task error: {}", err)))
                    }
                    Ok(None) => debug!("No failed task found for service {}", service_id),
                    Err(e) => {
                        warn!("Failed to look up task error for {}: {}", service_id, e);
                        progress::emit(
                            &lines,
                            progress::harbor(format!("failed to get task error: {}", e)),
                        );
                    }
                }
            }
            Transition::StaleRollback => {
                debug!(
                    "Ignoring rollback_completed inherited by service {}",
                    service.spec.name
                );
            }
            Transition::Progressing(state) => debug!("Service {} is {}", service.spec.name, state),
            Transition::Unchanged => {}
        }
    }

    debug!("Rollout monitor for service {} stopped", service_id);
}

/// Error text of the most recently created failed or rejected task
pub async fn latest_task_error(
    client: &dyn ControlPlane,
    service_id: &str,
) -> Result<Option<String>, ControlPlaneError> {
    let tasks = client.list_tasks(&TaskFilter::service(service_id)).await?;
    Ok(latest_failed_task(&tasks).map(|task| {
        if task.status.err.is_empty() {
            task.status.message.clone()
        } else {
            task.status.err.clone()
        }
    }))
}

fn latest_failed_task(tasks: &[Task]) -> Option<&Task> {
    tasks
        .iter()
        .filter(|t| matches!(t.state(), Some(TaskState::Failed) | Some(TaskState::Rejected)))
        .max_by_key(|t| t.created_at)
}
