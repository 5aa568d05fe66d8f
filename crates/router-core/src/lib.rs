//! Build Router core - fan-out and supervision engine
//!
//! Provides the supervision engine that:
//! - Projects environment overrides into each started build
//! - Fans one trigger build out into N downstream workflow builds
//! - Polls every outstanding build to a terminal state
//! - Cascades abort to siblings and collects artifacts on failure

pub mod artifacts;
pub mod effects;
pub mod envproj;
pub mod launch;
pub mod supervise;

// Re-export key types
pub use artifacts::collect_artifacts;
pub use effects::BuildEventHandler;
pub use envproj::{from_process_env, project_environments};
pub use launch::{parse_workflows, start_all, LaunchedBuild};
pub use supervise::{Clock, StatusListener, Supervisor, TokioClock, Verdict, POLL_INTERVAL};
