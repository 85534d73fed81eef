//! Remove the app from the swarm.

use anyhow::{Context as _, Result};
use dialoguer::Confirm;
use harbormaster::deploy::progress::{ConsoleSink, ProgressSink};
use harbormaster::deploy::reconcile::find_service;
use harbormaster::proxy::{caddy, CaddyProxy, ProxyWriter};
use tracing::warn;

use super::{connect, Context, DestroyArgs};

/// Run the destroy command.
pub async fn run(args: DestroyArgs, ctx: &Context) -> Result<()> {
    let config = ctx.app_config().await?;

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Are you sure you want to destroy the app '{}'?", config.name))
            .default(false)
            .interact()?;
        if !confirmed {
            return Ok(());
        }
    }

    let client = connect(&config)?;
    let sink = ConsoleSink;

    match find_service(client.as_ref(), &config.name).await? {
        Some(service) => {
            sink.line(&format!("harbor: removing service {}...", config.name));
            client
                .remove_service(&service.id)
                .await
                .with_context(|| format!("failed to remove service {}", config.name))?;
        }
        None => warn!("Service {} is not deployed", config.name),
    }

    if config.public_address().is_some() {
        sink.line(&format!(
            "harbor: removing proxy config for service {}...",
            config.name
        ));
        CaddyProxy::new(client, caddy::Options::default())
            .remove_routes(&config.name)
            .await
            .with_context(|| format!("failed to remove proxy config for {}", config.name))?;
    }

    println!("{}", config.name);
    Ok(())
}
