//! HTTP client for the Bitrise v0.1 API.
//!
//! Every operation goes through one retry helper so the backoff policy is
//! applied uniformly. Remote failures keep the status code and raw body.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{header, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::retry::RetryPolicy;
use crate::secret::Secret;
use crate::service::BuildService;
use crate::types::{
    AbortParams, Artifact, ArtifactListItem, Build, DataEnvelope, Environment, HookInfo,
    StartRequest, StartResponse,
};

const DEFAULT_BASE_URL: &str = "https://api.bitrise.io";

/// Environment variable name injected into every child build so downstream
/// workflows can reference the triggering build's number.
pub const SOURCE_BUILD_NUMBER_KEY: &str = "SOURCE_BITRISE_BUILD_NUMBER";

/// Client bound to one app on the build service.
#[derive(Clone)]
pub struct AppClient {
    http: reqwest::Client,
    base_url: String,
    app_slug: String,
    access_token: Secret,
    retry: RetryPolicy,
}

impl AppClient {
    /// Client against the production API with the standard retry profile.
    pub fn new(app_slug: impl Into<String>, access_token: Secret) -> Self {
        AppClient {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            app_slug: app_slug.into(),
            access_token,
            retry: RetryPolicy::standard(),
        }
    }

    /// Point the client at a different API root (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the retry profile.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn builds_url(&self) -> String {
        format!("{}/v0.1/apps/{}/builds", self.base_url, self.app_slug)
    }

    /// Send a request, retrying transport errors and retryable status codes
    /// within the policy's budget. Returns the raw body of a 2xx response.
    async fn send_with_retry<B>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> ApiResult<String>
    where
        B: Serialize + ?Sized,
    {
        let mut attempt = 0u32;
        loop {
            let mut request = self
                .http
                .request(method.clone(), url)
                .header(header::AUTHORIZATION, format!("token {}", self.access_token.reveal()));
            if let Some(body) = body {
                request = request.json(body);
            }

            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    match response.text().await {
                        Ok(text) if (200..300).contains(&status) => return Ok(text),
                        Ok(text) => {
                            let error = ApiError::Status { code: status, body: text };
                            if !RetryPolicy::retryable_status(status) {
                                return Err(error);
                            }
                            error
                        }
                        Err(err) => ApiError::Transport(err),
                    }
                }
                Err(err) => ApiError::Transport(err),
            };

            attempt += 1;
            if attempt >= self.retry.max_attempts {
                return Err(error);
            }
            let wait = self.retry.backoff(attempt - 1);
            warn!(%url, attempt, wait_ms = wait.as_millis() as u64, error = %error, "retrying request");
            tokio::time::sleep(wait).await;
        }
    }

    async fn request_json<B, T>(&self, method: Method, url: &str, body: Option<&B>) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body_text = self.send_with_retry(method, url, body).await?;
        serde_json::from_str(&body_text).map_err(|source| ApiError::Decode {
            body: body_text,
            source,
        })
    }
}

#[async_trait]
impl BuildService for AppClient {
    async fn get_build(&self, build_slug: &str) -> ApiResult<Build> {
        let url = format!("{}/{}", self.builds_url(), build_slug);
        debug!(%build_slug, "fetching build");
        let envelope: DataEnvelope<Build> =
            self.request_json(Method::GET, &url, None::<&()>).await?;
        Ok(envelope.data)
    }

    async fn start_build(
        &self,
        workflow: &str,
        original_params: &Map<String, Value>,
        build_number: &str,
        environments: &[Environment],
    ) -> ApiResult<StartResponse> {
        // Opaque passthrough of the parent's parameters, with the overlay
        // keys the router controls written on top.
        let mut params = original_params.clone();
        params.insert("workflow_id".to_string(), Value::String(workflow.to_string()));
        params.insert("skip_git_status_report".to_string(), Value::Bool(true));

        let mut env_list = vec![Environment {
            mapped_to: SOURCE_BUILD_NUMBER_KEY.to_string(),
            value: build_number.to_string(),
        }];
        env_list.extend_from_slice(environments);
        let env_values = env_list
            .iter()
            .map(|env| {
                let mut entry = Map::new();
                entry.insert("mapped_to".to_string(), Value::String(env.mapped_to.clone()));
                entry.insert("value".to_string(), Value::String(env.value.clone()));
                Value::Object(entry)
            })
            .collect();
        params.insert("environments".to_string(), Value::Array(env_values));

        let request = StartRequest {
            hook_info: HookInfo { hook_type: "bitrise" },
            build_params: params,
        };

        debug!(%workflow, "starting build");
        let response: StartResponse = self
            .request_json(Method::POST, &self.builds_url(), Some(&request))
            .await?;

        // A 2xx with no slug means the platform refused to queue the build.
        if response.build_slug.is_empty() {
            return Err(ApiError::BuildNotQueued {
                message: response.message.clone(),
            });
        }
        Ok(response)
    }

    async fn abort_build(&self, build_slug: &str, reason: &str) -> ApiResult<()> {
        let url = format!("{}/{}/abort", self.builds_url(), build_slug);
        let params = AbortParams {
            abort_reason: reason,
            abort_with_success: false,
            skip_notifications: true,
        };
        self.send_with_retry(Method::POST, &url, Some(&params)).await?;
        Ok(())
    }

    async fn list_artifacts(&self, build_slug: &str) -> ApiResult<Vec<ArtifactListItem>> {
        let url = format!("{}/{}/artifacts", self.builds_url(), build_slug);
        let envelope: DataEnvelope<Vec<ArtifactListItem>> =
            self.request_json(Method::GET, &url, None::<&()>).await?;
        Ok(envelope.data)
    }

    async fn get_artifact(&self, build_slug: &str, artifact_slug: &str) -> ApiResult<Artifact> {
        let url = format!("{}/{}/artifacts/{}", self.builds_url(), build_slug, artifact_slug);
        let envelope: DataEnvelope<Artifact> =
            self.request_json(Method::GET, &url, None::<&()>).await?;
        Ok(envelope.data)
    }

    async fn download_artifact(&self, download_url: &str, dest: &Path) -> ApiResult<()> {
        // Expiring URLs are pre-signed; no auth header, no retry.
        let response = self.http.get(download_url).send().await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { code: status, body });
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client_for(server: &Server) -> AppClient {
        AppClient::new("app-1", Secret::new("tok-1"))
            .with_base_url(server.url())
            .with_retry_policy(RetryPolicy::fast())
    }

    #[tokio::test]
    async fn get_build_decodes_envelope_and_sends_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v0.1/apps/app-1/builds/b-1")
            .match_header("authorization", "token tok-1")
            .with_status(200)
            .with_body(
                r#"{"data":{"slug":"b-1","status":0,"status_text":"in-progress",
                    "build_number":12,"triggered_workflow":"lint",
                    "original_build_params":{"branch":"main"}}}"#,
            )
            .create_async()
            .await;

        let build = client_for(&server).get_build("b-1").await.unwrap();
        assert_eq!(build.slug, "b-1");
        assert_eq!(build.status, crate::types::BuildStatus::Running);
        assert_eq!(build.original_build_params["branch"], "main");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_build_carries_status_and_body_on_client_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v0.1/apps/app-1/builds/missing")
            .with_status(404)
            .with_body("no such build")
            .create_async()
            .await;

        let err = client_for(&server).get_build("missing").await.unwrap_err();
        match err {
            ApiError::Status { code, body } => {
                assert_eq!(code, 404);
                assert_eq!(body, "no such build");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_build_surfaces_decode_failure_with_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v0.1/apps/app-1/builds/b-1")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client_for(&server).get_build("b-1").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/v0.1/apps/app-1/builds/b-1")
            .with_status(500)
            .with_body("flaky")
            .expect(2)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/v0.1/apps/app-1/builds/b-1")
            .with_status(200)
            .with_body(r#"{"data":{"slug":"b-1","status":1,"status_text":"success"}}"#)
            .create_async()
            .await;

        let build = client_for(&server).get_build("b-1").await.unwrap();
        assert!(build.status.is_success());
        failing.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_returns_last_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v0.1/apps/app-1/builds/b-1")
            .with_status(503)
            .with_body("down")
            .expect(3)
            .create_async()
            .await;

        let err = client_for(&server).get_build("b-1").await.unwrap_err();
        match err {
            ApiError::Status { code, body } => {
                assert_eq!(code, 503);
                assert_eq!(body, "down");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_build_merges_overlay_and_environments() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v0.1/apps/app-1/builds")
            .match_header("authorization", "token tok-1")
            .match_body(Matcher::Json(serde_json::json!({
                "hook_info": {"type": "bitrise"},
                "build_params": {
                    "branch": "main",
                    "commit_hash": "deadbeef",
                    "workflow_id": "nightly",
                    "skip_git_status_report": true,
                    "environments": [
                        {"mapped_to": "SOURCE_BITRISE_BUILD_NUMBER", "value": "77"},
                        {"mapped_to": "FOO", "value": "1"}
                    ]
                }
            })))
            .with_status(201)
            .with_body(
                r#"{"status":"ok","message":"queued","build_slug":"child-1",
                    "build_number":78,"build_url":"https://app.bitrise.io/build/child-1",
                    "triggered_workflow":"nightly"}"#,
            )
            .create_async()
            .await;

        let mut params = Map::new();
        params.insert("branch".to_string(), Value::String("main".to_string()));
        params.insert("commit_hash".to_string(), Value::String("deadbeef".to_string()));

        let envs = vec![Environment {
            mapped_to: "FOO".to_string(),
            value: "1".to_string(),
        }];
        let started = client_for(&server)
            .start_build("nightly", &params, "77", &envs)
            .await
            .unwrap();
        assert_eq!(started.build_slug, "child-1");
        assert_eq!(started.triggered_workflow, "nightly");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_build_with_empty_slug_is_not_queued() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v0.1/apps/app-1/builds")
            .with_status(200)
            .with_body(r#"{"status":"ok","message":"awaiting approval","build_slug":""}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .start_build("nightly", &Map::new(), "77", &[])
            .await
            .unwrap_err();
        match err {
            ApiError::BuildNotQueued { message } => assert_eq!(message, "awaiting approval"),
            other => panic!("expected BuildNotQueued, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn abort_build_posts_reason_without_success_flag() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v0.1/apps/app-1/builds/b-2/abort")
            .match_body(Matcher::Json(serde_json::json!({
                "abort_reason": "sibling failed",
                "abort_with_success": false,
                "skip_notifications": true
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        client_for(&server).abort_build("b-2", "sibling failed").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn artifact_listing_and_download() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v0.1/apps/app-1/builds/b-1/artifacts")
            .with_status(200)
            .with_body(r#"{"data":[{"slug":"art-1"},{"slug":"art-2"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v0.1/apps/app-1/builds/b-1/artifacts/art-1")
            .with_status(200)
            .with_body(&format!(
                r#"{{"data":{{"expiring_download_url":"{}/blob/art-1","title":"app.apk"}}}}"#,
                server.url()
            ))
            .create_async()
            .await;
        server
            .mock("GET", "/blob/art-1")
            .with_status(200)
            .with_body("binary-bytes")
            .create_async()
            .await;

        let client = client_for(&server);
        let listed = client.list_artifacts("b-1").await.unwrap();
        assert_eq!(listed.len(), 2);

        let artifact = client.get_artifact("b-1", &listed[0].slug).await.unwrap();
        assert_eq!(artifact.title, "app.apk");

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(&artifact.title);
        client.download_artifact(&artifact.download_url, &dest).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "binary-bytes");
    }
}
