//! Artifact collection for terminal builds.

use std::path::Path;

use tracing::{info, warn};

use router_api::BuildService;

/// Download every artifact of `build_slug` into `save_dir`, one file per
/// artifact title. Every per-artifact failure is a warning; collection keeps
/// going with the remaining artifacts.
pub async fn collect_artifacts(api: &dyn BuildService, build_slug: &str, save_dir: &Path) {
    let listed = match api.list_artifacts(build_slug).await {
        Ok(listed) => listed,
        Err(err) => {
            warn!("failed to get build artifacts, error: {err}");
            return;
        }
    };

    for item in listed {
        let artifact = match api.get_artifact(build_slug, &item.slug).await {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!("failed to get build artifact, error: {err}");
                continue;
            }
        };

        let dest = save_dir.join(&artifact.title);
        match api.download_artifact(&artifact.download_url, &dest).await {
            Ok(()) => info!("Downloaded: {} to path {}", artifact.title, dest.display()),
            Err(err) => warn!("failed to download artifact, error: {err}"),
        }
    }
}
