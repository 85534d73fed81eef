//! Show the deployed state of the app.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context as _, Result};
use colored::Colorize;
use harbormaster::cluster;
use harbormaster::config::GoDuration;
use harbormaster::deploy::reconcile::find_service;
use harbormaster::docker::{ControlPlane, TaskFilter};
use swarm_api::{Service, Task, TaskState};

use super::{connect, Context};

#[derive(Debug, Default)]
struct AppInfo {
    name: String,
    status: String,
    health_error: String,
    image: String,
    env: BTreeMap<String, String>,
    secrets: Vec<String>,
    health_check: Option<HealthCheckInfo>,
}

#[derive(Debug)]
struct HealthCheckInfo {
    test: String,
    interval: String,
    timeout: String,
    retries: i64,
}

/// Run the info command.
pub async fn run(ctx: &Context) -> Result<()> {
    let config = ctx.app_config().await?;
    let mut info = AppInfo {
        name: config.name.clone(),
        status: "Not Deployed".to_string(),
        ..Default::default()
    };

    let client = connect(&config)?;
    if cluster::is_swarm_inactive(client.as_ref()).await? {
        print_info(&info);
        return Ok(());
    }

    if let Some(service) = find_service(client.as_ref(), &config.name).await? {
        populate(client.as_ref(), &service, &mut info).await?;
    }

    print_info(&info);
    Ok(())
}

async fn populate(client: &dyn ControlPlane, service: &Service, info: &mut AppInfo) -> Result<()> {
    info.status = "Deployed".to_string();

    if let Some(container) = &service.spec.task_template.container_spec {
        info.image = container.image.clone();
        info.env = container
            .env
            .iter()
            .filter_map(|e| e.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        info.secrets = container.secrets.iter().map(|s| s.secret_name.clone()).collect();
        info.health_check = container.health_check.as_ref().map(|hc| HealthCheckInfo {
            test: hc.test.join(" "),
            interval: format_nanos(hc.interval),
            timeout: format_nanos(hc.timeout),
            retries: hc.retries,
        });
    }

    let tasks = client
        .list_tasks(&TaskFilter::service(&service.id))
        .await
        .context("list tasks")?;
    let current: Vec<&Task> = tasks.iter().filter(|t| is_current(t)).collect();
    if current.is_empty() {
        info.status = "Deployed (no containers)".to_string();
        return Ok(());
    }

    let (status, health_error) = container_status(client, &current).await?;
    info.status = format!("Deployed ({})", status);
    info.health_error = health_error;
    Ok(())
}

fn is_current(task: &Task) -> bool {
    task.desired_state == Some(TaskState::Running)
        && matches!(task.state(), Some(TaskState::Running) | Some(TaskState::Starting))
}

/// Health of the first inspectable container, with the failing check output
async fn container_status(client: &dyn ControlPlane, tasks: &[&Task]) -> Result<(String, String)> {
    for container_id in tasks.iter().filter_map(|t| t.container_id()) {
        let container = client
            .inspect_container(container_id)
            .await
            .with_context(|| format!("inspect container {}", container_id))?;

        if let Some(health) = &container.state.health {
            if health.status == "unhealthy" {
                let logs: Vec<&str> = health.log.iter().map(|l| l.output.as_str()).collect();
                return Ok((health.status.clone(), logs.join("\n")));
            }
            return Ok((health.status.clone(), container.state.error.clone()));
        }
    }
    Ok(("unknown".to_string(), String::new()))
}

fn format_nanos(nanos: i64) -> String {
    GoDuration(Duration::from_nanos(u64::try_from(nanos).unwrap_or(0))).to_string()
}

fn print_info(info: &AppInfo) {
    println!("{} {}", "Name:".bold(), info.name);
    println!("{} {}", "Status:".bold(), info.status);

    if !info.health_error.is_empty() {
        println!("\n{}\n{}", "Health Check Error:".bold(), info.health_error);
    }

    if !info.image.is_empty() {
        println!("\n{} {}", "Image:".bold(), info.image);
    }

    if !info.env.is_empty() {
        println!("\n{}", "Environment:".bold());
        for (k, v) in &info.env {
            println!("  {}={}", k, v);
        }
    }

    if !info.secrets.is_empty() {
        println!("\n{}", "Secrets:".bold());
        for s in &info.secrets {
            println!("  {}", s);
        }
    }

    if let Some(hc) = &info.health_check {
        println!("\n{}", "Health Check:".bold());
        println!("  Test: {}", hc.test);
        println!("  Interval: {}", hc.interval);
        println!("  Timeout: {}", hc.timeout);
        println!("  Retries: {}", hc.retries);
    }
}
