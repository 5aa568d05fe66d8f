//! Side effects driven by status-change notifications: per-status reporting,
//! cascading abort of siblings, and artifact collection.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use router_api::{build_dashboard_url, Build, BuildService, BuildStatus};

use crate::artifacts::collect_artifacts;
use crate::supervise::StatusListener;

/// Status-change listener wired into the supervisor in production.
///
/// Holds the full list of started builds so a failure can abort every
/// sibling, including ones that already finished (the remote treats abort of
/// a terminal build as a no-op or rejects it; either way it is best-effort).
pub struct BuildEventHandler {
    api: Arc<dyn BuildService>,
    all_slugs: Vec<String>,
    abort_on_fail: bool,
    artifacts_dir: Option<PathBuf>,
}

impl BuildEventHandler {
    pub fn new(
        api: Arc<dyn BuildService>,
        all_slugs: Vec<String>,
        abort_on_fail: bool,
        artifacts_dir: Option<PathBuf>,
    ) -> Self {
        BuildEventHandler {
            api,
            all_slugs,
            abort_on_fail,
            artifacts_dir,
        }
    }

    fn report(build: &Build) {
        let workflow = &build.triggered_workflow;
        match build.status {
            BuildStatus::Running => info!("- {} {}", workflow, build.status_text),
            BuildStatus::Succeeded => info!("- {} successful", workflow),
            BuildStatus::Failed => error!("- {} failed", workflow),
            BuildStatus::Aborted => warn!("- {} aborted", workflow),
            BuildStatus::Cancelled => info!("- {} cancelled", workflow),
            BuildStatus::Other(code) => error!("- {} finished with status {}", workflow, code),
        }
    }

    async fn abort_siblings(&self, failed: &Build) {
        let reason = format!(
            "Abort on Fail - Build [{}] {}\nAuto aborted by parent build",
            build_dashboard_url(&failed.slug),
            failed.status.outcome()
        );
        for slug in &self.all_slugs {
            if slug == &failed.slug {
                continue;
            }
            if let Err(err) = self.api.abort_build(slug, &reason).await {
                warn!("failed to abort build, error: {err}");
                continue;
            }
            info!("Build {slug} aborted due to associated build failure");
        }
    }
}

#[async_trait]
impl StatusListener for BuildEventHandler {
    async fn on_status_change(&self, build: &Build) {
        Self::report(build);

        let failed = build.status.is_terminal() && !build.status.is_success();
        if failed && self.abort_on_fail {
            self.abort_siblings(build).await;
        }

        if failed {
            if let Some(dir) = &self.artifacts_dir {
                collect_artifacts(self.api.as_ref(), &build.slug, dir).await;
            }
        }
    }
}
