//! Print build information.

use anyhow::Result;
use harbormaster::utils::version_info;

/// Run the version command.
pub fn run() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&version_info())?);
    Ok(())
}
