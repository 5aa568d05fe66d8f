//! Trait seam between the supervision engine and the remote service.
//!
//! The launcher and supervisor consume `Arc<dyn BuildService>`, so the state
//! machine can be exercised with the in-memory fake from [`crate::fakes`]
//! while production wiring uses [`crate::AppClient`].

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ApiResult;
use crate::types::{Artifact, ArtifactListItem, Build, Environment, StartResponse};

/// Remote build operations the router depends on.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Fetch the current snapshot of one build.
    async fn get_build(&self, build_slug: &str) -> ApiResult<Build>;

    /// Start a build of `workflow`, replicating the parent's parameters and
    /// injecting the given environment overrides.
    async fn start_build(
        &self,
        workflow: &str,
        original_params: &Map<String, Value>,
        build_number: &str,
        environments: &[Environment],
    ) -> ApiResult<StartResponse>;

    /// Abort a build. Best-effort from the caller's point of view.
    async fn abort_build(&self, build_slug: &str, reason: &str) -> ApiResult<()>;

    /// List the artifacts a build produced.
    async fn list_artifacts(&self, build_slug: &str) -> ApiResult<Vec<ArtifactListItem>>;

    /// Fetch one artifact record, including its download URL.
    async fn get_artifact(&self, build_slug: &str, artifact_slug: &str) -> ApiResult<Artifact>;

    /// Download an artifact payload to a local file.
    async fn download_artifact(&self, download_url: &str, dest: &Path) -> ApiResult<()>;
}
