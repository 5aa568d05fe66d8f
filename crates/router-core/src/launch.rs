//! Fan-out launcher: one started build per requested workflow.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::info;

use router_api::{build_dashboard_url, BuildService, Environment};

/// A successfully started downstream build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedBuild {
    pub build_slug: String,
    pub workflow: String,
    pub build_url: String,
}

/// Split a newline-delimited workflow list into trimmed, non-empty names.
pub fn parse_workflows(list: &str) -> Vec<String> {
    list.trim()
        .lines()
        .map(str::trim)
        .filter(|workflow| !workflow.is_empty())
        .map(str::to_string)
        .collect()
}

/// Start one build per workflow, replicating the parent's parameters.
///
/// Any start failure (including the not-queued case) fails the whole run;
/// builds already started are not rolled back. Returns the launched builds
/// in input order.
pub async fn start_all(
    api: Arc<dyn BuildService>,
    workflows: &[String],
    original_params: &Map<String, Value>,
    build_number: &str,
    environments: &[Environment],
) -> Result<Vec<LaunchedBuild>> {
    let mut launched = Vec::with_capacity(workflows.len());
    for workflow in workflows {
        let started = api
            .start_build(workflow, original_params, build_number, environments)
            .await
            .with_context(|| format!("failed to start build for workflow '{workflow}'"))?;

        let build_url = build_dashboard_url(&started.build_slug);
        info!("- {} started ({})", started.triggered_workflow, build_url);
        launched.push(LaunchedBuild {
            build_slug: started.build_slug,
            workflow: started.triggered_workflow,
            build_url,
        });
    }
    Ok(launched)
}
