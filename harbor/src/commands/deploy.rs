//! Deploy the app to the swarm.

use anyhow::{bail, Context as _, Result};
use harbormaster::cluster;
use harbormaster::deploy::progress::{ConsoleSink, ProgressSink};
use harbormaster::deploy::scope::CancelScope;
use harbormaster::deploy::wait::WaitOptions;
use harbormaster::deploy::{deploy_app, DeployRequest};
use harbormaster::images;
use harbormaster::proxy::{caddy, CaddyProxy, ProxyWriter};
use tracing::info;

use super::{advertise_host, connect, connect_local, Context, DeployArgs};

/// Run the deploy command.
pub async fn run(args: DeployArgs, ctx: &Context) -> Result<()> {
    let config = ctx.app_config().await?;
    let client = connect(&config)?;
    let sink = ConsoleSink;

    sink.line("harbor: preparing swarm...");
    cluster::prepare(client.as_ref(), &advertise_host(&config)?, &sink).await?;

    match connect_local(&config)? {
        Some(local) => {
            sink.line("harbor: sending image to remote host...");
            images::send_image(local.as_ref(), client.as_ref(), &config.image, &sink).await?;
        }
        None => info!("No local engine configured, the swarm pulls {}", config.image),
    }

    let proxy = CaddyProxy::new(client.clone(), caddy::Options::default());
    if config.public_address().is_some() {
        proxy
            .ensure_service(&sink, &ctx.interrupt)
            .await
            .context("failed to prepare the proxy")?;
    }

    let request = DeployRequest {
        app: config.to_description(),
        secrets: config.load_secrets(ctx.config_dir()).await?,
    };

    let parent = CancelScope::new();
    if let Some(timeout) = args.timeout {
        let parent = parent.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = parent.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    info!("Deploy timeout of {:?} reached", timeout);
                    parent.cancel();
                }
            }
        });
    }

    let outcome = deploy_app(
        client,
        &request,
        WaitOptions::default(),
        &sink,
        &parent,
        &ctx.interrupt,
    )
    .await?;
    // releases the timeout task
    parent.cancel();

    if !outcome.is_success() {
        bail!("deploy of '{}' {}", config.name, outcome);
    }

    let routes = config.routes();
    if let Some(address) = config.public_address() {
        sink.line(&format!("harbor: configuring public access for {}", address));
        proxy
            .write_routes(&config.name, &config.name, &routes)
            .await
            .context("failed to configure public access")?;
    }

    println!("{}", config.name);
    Ok(())
}
