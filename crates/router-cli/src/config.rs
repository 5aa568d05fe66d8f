//! Configuration surface of the `build-router` binary.
//!
//! Every input doubles as a CLI flag and an environment variable, so the
//! binary works both from a shell and as a CI step where inputs arrive in
//! the environment. Env names follow the step's input contract.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use router_api::Secret;

#[derive(Parser, Debug)]
#[command(name = "build-router")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fan out one CI build into downstream workflow builds and supervise them", long_about = None)]
pub struct Config {
    /// App slug the builds belong to
    #[arg(long, env = "BITRISE_APP_SLUG")]
    pub app_slug: String,

    /// Slug of the triggering (parent) build
    #[arg(long, env = "BITRISE_BUILD_SLUG")]
    pub build_slug: String,

    /// Number of the triggering build, propagated into children
    #[arg(long, env = "BITRISE_BUILD_NUMBER")]
    pub build_number: String,

    /// API access token
    #[arg(long, env = "access_token", hide_env_values = true)]
    pub access_token: Secret,

    /// Newline-delimited list of workflows to start
    #[arg(long, env = "workflows")]
    pub workflows: String,

    /// "true" keeps the process alive until every started build finishes
    #[arg(long, env = "wait_for_builds", default_value = "false")]
    pub wait_for_builds: String,

    /// Directory to save failed builds' artifacts into (empty disables)
    #[arg(long, env = "build_artifacts_save_path", default_value = "")]
    pub build_artifacts_save_path: String,

    /// "yes" aborts every sibling build when one fails
    #[arg(long, env = "abort_on_fail", default_value = "no")]
    pub abort_on_fail: String,

    /// Newline-delimited environment variable names to pass to children
    #[arg(long, env = "environment_key_list", default_value = "")]
    pub environment_key_list: String,

    /// "true" enables debug logging
    #[arg(long, env = "verbose", default_value = "false")]
    pub verbose: String,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,

    /// Module name that gates the run: when set, the run is skipped unless
    /// the pull request touched this module
    #[arg(long, env = "gate_module")]
    pub gate_module: Option<String>,

    /// GitHub token for the change gate
    #[arg(long, env = "github_access_token", hide_env_values = true)]
    pub github_access_token: Option<Secret>,

    /// GitHub repository for the change gate, as "owner/name"
    #[arg(long, env = "github_repository")]
    pub github_repository: Option<String>,

    /// Pull request number for the change gate
    #[arg(long, env = "PULL_REQUEST_ID")]
    pub pull_request_id: Option<u64>,
}

/// Resolved change-gate settings.
#[derive(Debug)]
pub struct ChangeGate {
    pub owner: String,
    pub repo: String,
    pub token: Secret,
    pub pr_number: u64,
    pub module: String,
}

impl Config {
    pub fn wants_wait(&self) -> bool {
        self.wait_for_builds.trim() == "true"
    }

    pub fn wants_abort_on_fail(&self) -> bool {
        self.abort_on_fail.trim() == "yes"
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self.verbose.trim(), "true" | "yes")
    }

    pub fn artifacts_dir(&self) -> Option<PathBuf> {
        let trimmed = self.build_artifacts_save_path.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }

    /// The change gate, when configured. Setting `gate_module` without the
    /// GitHub inputs it needs is a configuration error.
    pub fn change_gate(&self) -> Result<Option<ChangeGate>> {
        let module = match &self.gate_module {
            Some(module) => module.clone(),
            None => return Ok(None),
        };
        let (Some(token), Some(repository), Some(pr_number)) = (
            self.github_access_token.clone(),
            self.github_repository.as_deref(),
            self.pull_request_id,
        ) else {
            bail!("gate_module requires github_access_token, github_repository and PULL_REQUEST_ID");
        };
        let Some((owner, repo)) = repository.split_once('/') else {
            bail!("github_repository must be of the form owner/name, got '{repository}'");
        };
        Ok(Some(ChangeGate {
            owner: owner.to_string(),
            repo: repo.to_string(),
            token,
            pr_number,
            module,
        }))
    }

    /// Log the resolved configuration, secrets masked.
    pub fn echo(&self) {
        info!("Configuration:");
        info!("- app_slug: {}", self.app_slug);
        info!("- build_slug: {}", self.build_slug);
        info!("- build_number: {}", self.build_number);
        info!("- access_token: {}", self.access_token);
        info!("- workflows: {:?}", self.workflows);
        info!("- wait_for_builds: {}", self.wait_for_builds);
        info!("- abort_on_fail: {}", self.abort_on_fail);
        info!("- build_artifacts_save_path: {}", self.build_artifacts_save_path);
        info!("- environment_key_list: {:?}", self.environment_key_list);
        info!("- verbose: {}", self.verbose);
    }
}
