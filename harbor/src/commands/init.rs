//! Write a default app config.

use anyhow::{bail, Context as _, Result};
use harbormaster::config::AppConfig;

use super::{Context, InitArgs};

/// Run the init command.
pub async fn run(args: InitArgs, ctx: &Context) -> Result<()> {
    if ctx.config_path.exists() {
        bail!("{} already exists", ctx.config_path.display());
    }

    let name = match args.name {
        Some(name) => name,
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            cwd.file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .context("Cannot derive an app name from the current directory, pass --name")?
        }
    };

    AppConfig::new_default(name).save(&ctx.config_path).await?;
    println!("{}", ctx.config_path.display());
    Ok(())
}
