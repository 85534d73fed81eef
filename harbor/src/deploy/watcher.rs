//! Container event watcher

use std::sync::Arc;

use futures::StreamExt;
use swarm_api::EventMessage;
use tracing::{debug, info, warn};

use crate::deploy::progress::{self, LineSender};
use crate::deploy::scope::CancelScope;
use crate::docker::{ControlPlane, EventFilter};
use crate::utils::{calc_exp_backoff, CooldownOptions};

pub const ACTION_CREATE: &str = "create";
pub const ACTION_START: &str = "start";
pub const ACTION_DIE: &str = "die";
pub const ACTION_HEALTHY: &str = "health_status: healthy";
pub const ACTION_UNHEALTHY: &str = "health_status: unhealthy";

/// Event watcher options
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Backoff between resubscriptions to the event feed
    pub cooldown: CooldownOptions,
}

/// Stream container events of `service_id` as progress lines until `scope`
/// is cancelled. Never decides the outcome of a rollout.
pub async fn run(
    client: Arc<dyn ControlPlane>,
    service_id: String,
    options: Options,
    lines: LineSender,
    scope: CancelScope,
) {
    info!("Event watcher starting for service {}", service_id);
    let filter = EventFilter::containers();
    let mut attempt = 0;

    'watch: loop {
        let subscribed = tokio::select! {
            _ = scope.cancelled() => break 'watch,
            result = client.subscribe_events(&filter) => result,
        };

        match subscribed {
            Ok(mut events) => loop {
                let next = tokio::select! {
                    _ = scope.cancelled() => break 'watch,
                    next = events.next() => next,
                };

                match next {
                    Some(Ok(event)) => {
                        attempt = 0;
                        if event.service_id() != Some(service_id.as_str()) {
                            continue;
                        }
                        if !handle_event(client.as_ref(), &event, &lines, &scope).await {
                            break 'watch;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Event feed error: {}", e);
                        progress::emit(&lines, progress::harbor(format!("event error: {}", e)));
                        break;
                    }
                    None => {
                        warn!("Event feed closed by the engine");
                        progress::emit(&lines, progress::harbor("event feed closed, resubscribing..."));
                        break;
                    }
                }
            },
            Err(e) => {
                warn!("Failed to subscribe to events: {}", e);
                progress::emit(&lines, progress::harbor(format!("event error: {}", e)));
            }
        }

        let delay = calc_exp_backoff(&options.cooldown, attempt);
        attempt = attempt.saturating_add(1);
        debug!("Resubscribing to events in {:?}", delay);

        tokio::select! {
            _ = scope.cancelled() => break 'watch,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!("Event watcher for service {} stopped", service_id);
}

/// Emit the lines for one matching event. Returns false if cancelled.
async fn handle_event(
    client: &dyn ControlPlane,
    event: &EventMessage,
    lines: &LineSender,
    scope: &CancelScope,
) -> bool {
    let Some(line) = render_event(event) else {
        return true;
    };
    progress::emit(lines, line);

    if event.action != ACTION_UNHEALTHY {
        return true;
    }

    let inspected = tokio::select! {
        _ = scope.cancelled() => return false,
        result = client.inspect_container(&event.actor.id) => result,
    };

    match inspected {
        Ok(container) => {
            if let Some(output) = container.latest_health_failure() {
                progress::emit(
                    lines,
                    progress::harbor(format!("health check error:\n {}", output.trim_end())),
                );
            }
        }
        Err(e) => warn!("Failed to inspect container {}: {}", event.actor.id, e),
    }
    true
}

/// Progress line for a container event, `None` for actions not shown
pub fn render_event(event: &EventMessage) -> Option<String> {
    let name = event
        .attribute("name")
        .filter(|n| !n.is_empty())
        .unwrap_or(event.actor.id.as_str());

    let text = match event.action.as_str() {
        ACTION_CREATE => format!("creating container {}...", name),
        ACTION_START => format!("starting container {}...", name),
        ACTION_DIE => format!("container {} stopped.", name),
        ACTION_HEALTHY => format!("container {} is healthy.", name),
        ACTION_UNHEALTHY => format!("container {} is unhealthy.", name),
        _ => return None,
    };
    Some(progress::swarm(text))
}
