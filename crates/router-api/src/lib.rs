//! Remote build client for the build router.
//!
//! Provides:
//! - Typed operations against the Bitrise v0.1 API (get/start/abort build,
//!   artifact listing and download) behind the [`BuildService`] trait
//! - A uniform retry policy with exponential backoff
//! - Changed-module detection against the GitHub REST API
//! - In-memory fakes so the supervision engine tests run without a network

pub mod client;
pub mod error;
pub mod fakes;
pub mod github;
pub mod retry;
pub mod secret;
pub mod service;
pub mod types;

// Re-export key types
pub use client::{AppClient, SOURCE_BUILD_NUMBER_KEY};
pub use error::{ApiError, ApiResult};
pub use github::ChangeClient;
pub use retry::RetryPolicy;
pub use secret::Secret;
pub use service::BuildService;
pub use types::{Artifact, ArtifactListItem, Build, BuildStatus, Environment, StartResponse};

/// Human-followable dashboard URL for a build.
pub fn build_dashboard_url(build_slug: &str) -> String {
    format!("https://app.bitrise.io/build/{build_slug}")
}
