//! Remove unused objects from the swarm manager.

use anyhow::Result;
use dialoguer::Confirm;
use harbormaster::cluster;
use harbormaster::deploy::progress::ConsoleSink;

use super::{connect, Context, PruneArgs};

/// Run the prune command.
pub async fn run(args: PruneArgs, ctx: &Context) -> Result<()> {
    let config = ctx.app_config().await?;

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Are you sure you want to prune unused containers, images, volumes and networks on {}?",
                config.docker_host()?
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            return Ok(());
        }
    }

    let client = connect(&config)?;
    cluster::prune(client.as_ref(), &ConsoleSink).await?;
    Ok(())
}
