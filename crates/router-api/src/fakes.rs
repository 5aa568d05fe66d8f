//! In-memory fake for the `BuildService` trait (testing only)
//!
//! `RecordingBuildService` serves scripted build snapshots and records every
//! call, so the launcher and supervisor can be driven without a network.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::service::BuildService;
use crate::types::{Artifact, ArtifactListItem, Build, BuildStatus, Environment, StartResponse};

/// One recorded call against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetBuild { slug: String },
    StartBuild { workflow: String, build_number: String },
    AbortBuild { slug: String, reason: String },
    ListArtifacts { slug: String },
    GetArtifact { slug: String, artifact_slug: String },
    DownloadArtifact { url: String, dest: String },
}

/// Scripted `BuildService` that records calls.
#[derive(Default)]
pub struct RecordingBuildService {
    snapshots: Mutex<HashMap<String, VecDeque<Build>>>,
    start_responses: Mutex<VecDeque<ApiResult<StartResponse>>>,
    artifacts: Mutex<HashMap<String, Vec<ArtifactListItem>>>,
    artifact_meta: Mutex<HashMap<String, Artifact>>,
    fail_aborts: AtomicBool,
    fail_artifact_listing: AtomicBool,
    calls: Mutex<Vec<Call>>,
}

impl RecordingBuildService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the snapshots `get_build` will serve for `slug`, in order. The
    /// final snapshot keeps being served once the queue drains.
    pub fn script_build(&self, slug: &str, snapshots: Vec<Build>) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(slug.to_string(), snapshots.into());
    }

    /// Queue the next `start_build` outcome.
    pub fn push_start(&self, response: ApiResult<StartResponse>) {
        self.start_responses.lock().unwrap().push_back(response);
    }

    /// Script the artifact listing and per-artifact metadata for a build.
    pub fn script_artifacts(&self, slug: &str, artifacts: Vec<(String, Artifact)>) {
        let listing = artifacts
            .iter()
            .map(|(artifact_slug, _)| ArtifactListItem {
                slug: artifact_slug.clone(),
            })
            .collect();
        self.artifacts.lock().unwrap().insert(slug.to_string(), listing);
        let mut meta = self.artifact_meta.lock().unwrap();
        for (artifact_slug, artifact) in artifacts {
            meta.insert(artifact_slug, artifact);
        }
    }

    /// Script only the listing for a build. Entries without metadata make
    /// `get_artifact` fail for that slug.
    pub fn script_artifact_listing(&self, slug: &str, artifact_slugs: Vec<String>) {
        let listing = artifact_slugs
            .into_iter()
            .map(|artifact_slug| ArtifactListItem { slug: artifact_slug })
            .collect();
        self.artifacts.lock().unwrap().insert(slug.to_string(), listing);
    }

    /// Attach metadata for one artifact slug.
    pub fn script_artifact_meta(&self, artifact_slug: &str, artifact: Artifact) {
        self.artifact_meta
            .lock()
            .unwrap()
            .insert(artifact_slug.to_string(), artifact);
    }

    /// Make every `abort_build` call fail with a server error.
    pub fn fail_aborts(&self) {
        self.fail_aborts.store(true, Ordering::SeqCst);
    }

    /// Make every `list_artifacts` call fail with a server error.
    pub fn fail_artifact_listing(&self) {
        self.fail_artifact_listing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of `get_build` calls recorded for `slug`.
    pub fn poll_count(&self, slug: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::GetBuild { slug: s } if s == slug))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Convenience constructor for a build snapshot in tests.
pub fn snapshot(slug: &str, status: BuildStatus, status_text: &str, workflow: &str) -> Build {
    Build {
        slug: slug.to_string(),
        status,
        status_text: status_text.to_string(),
        build_number: 1,
        triggered_workflow: workflow.to_string(),
        original_build_params: Map::new(),
    }
}

/// Convenience constructor for a successful start response in tests.
pub fn started(slug: &str, workflow: &str) -> StartResponse {
    StartResponse {
        status: "ok".to_string(),
        message: String::new(),
        build_slug: slug.to_string(),
        build_number: 1,
        build_url: format!("https://app.bitrise.io/build/{slug}"),
        triggered_workflow: workflow.to_string(),
    }
}

fn server_error(body: &str) -> ApiError {
    ApiError::Status {
        code: 500,
        body: body.to_string(),
    }
}

#[async_trait]
impl BuildService for RecordingBuildService {
    async fn get_build(&self, build_slug: &str) -> ApiResult<Build> {
        self.record(Call::GetBuild {
            slug: build_slug.to_string(),
        });
        let mut snapshots = self.snapshots.lock().unwrap();
        let queue = snapshots
            .get_mut(build_slug)
            .ok_or_else(|| server_error("unscripted build"))?;
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap())
        } else {
            queue.front().cloned().ok_or_else(|| server_error("unscripted build"))
        }
    }

    async fn start_build(
        &self,
        workflow: &str,
        _original_params: &Map<String, Value>,
        build_number: &str,
        _environments: &[Environment],
    ) -> ApiResult<StartResponse> {
        self.record(Call::StartBuild {
            workflow: workflow.to_string(),
            build_number: build_number.to_string(),
        });
        self.start_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(server_error("unscripted start")))
    }

    async fn abort_build(&self, build_slug: &str, reason: &str) -> ApiResult<()> {
        self.record(Call::AbortBuild {
            slug: build_slug.to_string(),
            reason: reason.to_string(),
        });
        if self.fail_aborts.load(Ordering::SeqCst) {
            return Err(server_error("abort rejected"));
        }
        Ok(())
    }

    async fn list_artifacts(&self, build_slug: &str) -> ApiResult<Vec<ArtifactListItem>> {
        self.record(Call::ListArtifacts {
            slug: build_slug.to_string(),
        });
        if self.fail_artifact_listing.load(Ordering::SeqCst) {
            return Err(server_error("listing unavailable"));
        }
        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .get(build_slug)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_artifact(&self, build_slug: &str, artifact_slug: &str) -> ApiResult<Artifact> {
        self.record(Call::GetArtifact {
            slug: build_slug.to_string(),
            artifact_slug: artifact_slug.to_string(),
        });
        self.artifact_meta
            .lock()
            .unwrap()
            .get(artifact_slug)
            .cloned()
            .ok_or_else(|| server_error("unscripted artifact"))
    }

    async fn download_artifact(&self, download_url: &str, dest: &Path) -> ApiResult<()> {
        self.record(Call::DownloadArtifact {
            url: download_url.to_string(),
            dest: dest.display().to_string(),
        });
        Ok(())
    }
}
