//! Hand-off of results to downstream CI steps via `envman`.

use anyhow::{ensure, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Environment key the started-build slug list is exported under.
pub const STARTED_BUILD_SLUGS_KEY: &str = "ROUTER_STARTED_BUILD_SLUGS";

/// Export `key=value` into the step environment with `envman add`.
pub async fn export_env(key: &str, value: &str) -> Result<()> {
    debug!(%key, "exporting environment variable");
    let status = Command::new("envman")
        .args(["add", "--key", key, "--value", value])
        .status()
        .await
        .context("failed to run envman")?;
    ensure!(status.success(), "envman add exited with {status}");
    Ok(())
}
