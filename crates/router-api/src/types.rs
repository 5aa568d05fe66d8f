//! Wire types for the Bitrise v0.1 API.
//!
//! Field names and JSON tags follow the service contract bit-exactly where
//! the router consumes them. `original_build_params` is deliberately kept as
//! an untyped JSON object so unknown fields survive the round trip from the
//! parent build into each started child.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status codes a build moves through. `Running` is the only non-terminal
/// state; everything else is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Running,
    Succeeded,
    Failed,
    Aborted,
    Cancelled,
    /// A code outside the documented 0..=4 range. Treated as a terminal
    /// non-success state.
    Other(i64),
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BuildStatus::Running)
    }

    pub fn is_success(self) -> bool {
        matches!(self, BuildStatus::Succeeded)
    }

    /// Short outcome word used in abort reasons and status reports.
    pub fn outcome(self) -> &'static str {
        match self {
            BuildStatus::Running => "running",
            BuildStatus::Succeeded => "successful",
            BuildStatus::Failed => "failed",
            BuildStatus::Aborted => "aborted",
            BuildStatus::Cancelled => "cancelled",
            BuildStatus::Other(_) => "failed",
        }
    }
}

impl From<i64> for BuildStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => BuildStatus::Running,
            1 => BuildStatus::Succeeded,
            2 => BuildStatus::Failed,
            3 => BuildStatus::Aborted,
            4 => BuildStatus::Cancelled,
            other => BuildStatus::Other(other),
        }
    }
}

impl From<BuildStatus> for i64 {
    fn from(status: BuildStatus) -> Self {
        match status {
            BuildStatus::Running => 0,
            BuildStatus::Succeeded => 1,
            BuildStatus::Failed => 2,
            BuildStatus::Aborted => 3,
            BuildStatus::Cancelled => 4,
            BuildStatus::Other(code) => code,
        }
    }
}

impl Serialize for BuildStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        i64::from(*self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BuildStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(BuildStatus::from(i64::deserialize(deserializer)?))
    }
}

/// Snapshot of one remote build, as returned by `GET /builds/<slug>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub slug: String,
    pub status: BuildStatus,
    pub status_text: String,
    #[serde(default)]
    pub build_number: i64,
    #[serde(default)]
    pub triggered_workflow: String,
    /// Raw parameters the parent build was triggered with, replicated into
    /// each child. Opaque passthrough; only overlay keys are touched.
    #[serde(default)]
    pub original_build_params: Map<String, Value>,
}

/// Envelope the API wraps single-object responses in.
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

/// Response to a successful build-start request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub build_slug: String,
    #[serde(default)]
    pub build_number: i64,
    #[serde(default)]
    pub build_url: String,
    #[serde(default)]
    pub triggered_workflow: String,
}

/// One entry of the artifact listing for a build.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactListItem {
    pub slug: String,
}

/// Full artifact record, including the short-lived download URL.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    #[serde(rename = "expiring_download_url")]
    pub download_url: String,
    pub title: String,
}

/// An environment variable injected into a started build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub mapped_to: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct HookInfo {
    #[serde(rename = "type")]
    pub hook_type: &'static str,
}

/// POST body for starting a build: the webhook marker plus the merged
/// parameter object.
#[derive(Debug, Serialize)]
pub(crate) struct StartRequest {
    pub hook_info: HookInfo,
    pub build_params: Map<String, Value>,
}

/// POST body for aborting a build.
#[derive(Debug, Serialize)]
pub(crate) struct AbortParams<'a> {
    pub abort_reason: &'a str,
    pub abort_with_success: bool,
    pub skip_notifications: bool,
}
