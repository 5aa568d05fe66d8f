//! Changed-module detection against the GitHub REST API.
//!
//! Used before fan-out to answer "did this pull request touch module X";
//! when it didn't, the whole run can be skipped.

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::secret::Secret;

const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub lists pull-request files 30 per page.
const FILES_PER_PAGE: u64 = 30;

/// Top-level directory prefix that maps to `feature-*` gradle modules.
const FEATURE_DIR_PREFIX: &str = "features/";

/// Map a changed file path to the module it belongs to.
///
/// Paths under `features/` map to `feature-<subdir>`; anything else maps to
/// its first path segment.
pub fn module_name(filename: &str) -> String {
    let path = match filename.strip_prefix(FEATURE_DIR_PREFIX) {
        Some(rest) => format!("feature-{rest}"),
        None => filename.to_string(),
    };
    path.split('/').next().unwrap_or_default().to_string()
}

/// Number of listing pages needed for `changed_files` entries.
pub fn page_count(changed_files: u64) -> u64 {
    changed_files.div_ceil(FILES_PER_PAGE)
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    changed_files: u64,
}

#[derive(Debug, Deserialize)]
struct PullRequestFile {
    filename: String,
}

/// Client for one repository's pull-request file listings.
pub struct ChangeClient {
    http: reqwest::Client,
    base_url: String,
    token: Secret,
    owner: String,
    repo: String,
}

impl ChangeClient {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: Secret) -> Self {
        ChangeClient {
            http: reqwest::Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
            token,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Point the client at a different API root (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let response = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token.reveal()))
            .header("User-Agent", "build-router")
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(ApiError::Status { code: status, body });
        }
        serde_json::from_str(&body).map_err(|source| ApiError::Decode { body, source })
    }

    /// The set of module names touched by a pull request.
    pub async fn changed_modules(&self, pr_number: u64) -> ApiResult<BTreeSet<String>> {
        let pr_url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.base_url, self.owner, self.repo, pr_number
        );
        let pull: PullRequest = self.get_json(&pr_url).await?;

        let mut modules = BTreeSet::new();
        for page in 1..=page_count(pull.changed_files) {
            debug!(page, "fetching changed files");
            let files_url = format!("{pr_url}/files?page={page}&per_page={FILES_PER_PAGE}");
            let files: Vec<PullRequestFile> = self.get_json(&files_url).await?;
            for file in files {
                modules.insert(module_name(&file.filename));
            }
        }
        Ok(modules)
    }
}
