//! `build-router` - fan one CI build out into downstream workflow builds
//! and supervise them to completion.
//!
//! Flow: resolve configuration, optionally gate on the pull request's
//! changed modules, fetch the parent build's parameters, start one build per
//! requested workflow, export the started slugs for downstream steps, then
//! (when asked to) poll every build to a terminal state, cascading abort and
//! collecting artifacts on failure.

mod config;
mod envman;
mod telemetry;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};

use router_api::{AppClient, BuildService, ChangeClient};
use router_core::{
    from_process_env, parse_workflows, start_all, BuildEventHandler, Supervisor,
};

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::parse();

    let level = if cfg.is_verbose() {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cfg.json, level);
    cfg.echo();

    run(cfg).await
}

async fn run(cfg: Config) -> Result<()> {
    if let Some(gate) = cfg.change_gate()? {
        let changes = ChangeClient::new(gate.owner, gate.repo, gate.token);
        let modules = changes
            .changed_modules(gate.pr_number)
            .await
            .context("failed to list changed modules")?;
        info!("Changes detected in:");
        for module in &modules {
            info!(" - [ {module} ]");
        }
        if !modules.contains(&gate.module) {
            info!(
                "module '{}' not touched by this pull request, skipping fan-out",
                gate.module
            );
            return Ok(());
        }
    }

    let api: Arc<dyn BuildService> =
        Arc::new(AppClient::new(cfg.app_slug.clone(), cfg.access_token.clone()));

    let parent = api
        .get_build(&cfg.build_slug)
        .await
        .context("failed to get build")?;

    info!("Starting builds:");
    let environments = from_process_env(&cfg.environment_key_list);
    let workflows = parse_workflows(&cfg.workflows);
    let launched = start_all(
        api.clone(),
        &workflows,
        &parent.original_build_params,
        &cfg.build_number,
        &environments,
    )
    .await?;

    let slugs: Vec<String> = launched.iter().map(|b| b.build_slug.clone()).collect();
    envman::export_env(envman::STARTED_BUILD_SLUGS_KEY, &slugs.join("\n"))
        .await
        .context("failed to export environment variable")?;

    if !cfg.wants_wait() {
        return Ok(());
    }

    info!("Waiting for builds:");
    let handler = Arc::new(BuildEventHandler::new(
        api.clone(),
        slugs.clone(),
        cfg.wants_abort_on_fail(),
        cfg.artifacts_dir(),
    ));
    let verdict = Supervisor::new(api, handler)
        .wait_for_builds(&slugs)
        .await?;
    if !verdict.is_success() {
        bail!("at least one build failed or aborted");
    }
    Ok(())
}
