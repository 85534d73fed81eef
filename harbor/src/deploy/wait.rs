//! Waiting for a rollout to finish

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::deploy::monitor::{self, DoneSignal};
use crate::deploy::progress::ProgressSink;
use crate::deploy::scope::CancelScope;
use crate::deploy::watcher;
use crate::deploy::DeployOutcome;
use crate::docker::ControlPlane;

/// Options for both observers of a rollout
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    pub monitor: monitor::Options,
    pub watcher: watcher::Options,
}

/// Watch the rollout of `service_id` and resolve to its outcome.
///
/// The event watcher and the rollout monitor run as separate tasks and send
/// their progress lines here, where they are written to `sink` in order.
/// Resolves on the first of: the monitor's outcome, `interrupt` being
/// cancelled (`Cancelled`) or `parent` being cancelled (`ContextCancelled`).
/// Both tasks are stopped and joined, and every line they produced is
/// written, before this returns.
pub async fn wait_for_rollout(
    client: Arc<dyn ControlPlane>,
    service_id: &str,
    options: WaitOptions,
    sink: &dyn ProgressSink,
    parent: &CancelScope,
    interrupt: &CancelScope,
) -> DeployOutcome {
    let scope = CancelScope::new();
    let (lines_tx, mut lines_rx) = mpsc::unbounded_channel();
    let (done, mut done_rx) = DoneSignal::channel();

    let watcher = tokio::spawn(watcher::run(
        client.clone(),
        service_id.to_string(),
        options.watcher,
        lines_tx.clone(),
        scope.clone(),
    ));
    let monitor = tokio::spawn(monitor::run(
        client,
        service_id.to_string(),
        options.monitor,
        lines_tx,
        done,
        scope.clone(),
    ));

    let outcome = loop {
        tokio::select! {
            biased;
            _ = interrupt.cancelled() => {
                info!("Wait for service {} interrupted", service_id);
                break DeployOutcome::Cancelled;
            }
            _ = parent.cancelled() => {
                info!("Wait for service {} cancelled by its caller", service_id);
                break DeployOutcome::ContextCancelled;
            }
            result = &mut done_rx => {
                break match result {
                    Ok(outcome) => DeployOutcome::from(outcome),
                    Err(_) => DeployOutcome::Failed(
                        "rollout monitor stopped without an outcome".to_string(),
                    ),
                };
            }
            Some(line) = lines_rx.recv() => sink.line(&line),
        }
    };

    scope.cancel();
    for (name, handle) in [("event watcher", watcher), ("rollout monitor", monitor)] {
        if let Err(e) = handle.await {
            warn!("{} task failed: {}", name, e);
        }
    }

    // both senders are gone once the tasks are joined
    while let Ok(line) = lines_rx.try_recv() {
        sink.line(&line);
    }

    debug!("Wait for service {} resolved: {:?}", service_id, outcome);
    outcome
}
