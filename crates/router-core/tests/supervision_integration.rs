//! End-to-end supervision over the in-memory fake: fan-out, polling,
//! cascading abort, and artifact collection working together.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Map;

use router_api::fakes::{snapshot, started, Call, RecordingBuildService};
use router_api::BuildStatus;
use router_core::supervise::Clock;
use router_core::{parse_workflows, start_all, BuildEventHandler, Supervisor, Verdict};

struct InstantClock;

#[async_trait]
impl Clock for InstantClock {
    async fn sleep(&self, _duration: Duration) {}
}

/// Worked example: "lint" succeeds, "test" fails. The run fails, and with
/// abort-on-fail enabled the cascade aborts lint's build (already terminal,
/// per the unconditional-sibling policy) but never test's own build.
#[tokio::test]
async fn failed_sibling_fails_the_run_and_cascades_abort() {
    let api = Arc::new(RecordingBuildService::new());
    api.push_start(Ok(started("slug-lint", "lint")));
    api.push_start(Ok(started("slug-test", "test")));
    api.script_build(
        "slug-lint",
        vec![snapshot("slug-lint", BuildStatus::Succeeded, "success", "lint")],
    );
    api.script_build(
        "slug-test",
        vec![
            snapshot("slug-test", BuildStatus::Running, "in-progress", "test"),
            snapshot("slug-test", BuildStatus::Failed, "error", "test"),
        ],
    );

    let workflows = parse_workflows("lint\ntest\n");
    let launched = start_all(api.clone(), &workflows, &Map::new(), "7", &[])
        .await
        .expect("fan-out failed");
    assert_eq!(launched.len(), 2);

    let slugs: Vec<String> = launched.iter().map(|b| b.build_slug.clone()).collect();
    let handler = Arc::new(BuildEventHandler::new(
        api.clone(),
        slugs.clone(),
        true,
        Some(PathBuf::from("/tmp/failed-artifacts")),
    ));
    let verdict = Supervisor::new(api.clone(), handler)
        .with_clock(Arc::new(InstantClock))
        .wait_for_builds(&slugs)
        .await
        .expect("supervision errored");

    assert_eq!(verdict, Verdict::SomeFailed);

    let calls = api.calls();

    // Exactly one abort: lint's build, with the failing build's slug and
    // outcome embedded in the reason.
    let aborts: Vec<&Call> = calls
        .iter()
        .filter(|c| matches!(c, Call::AbortBuild { .. }))
        .collect();
    assert_eq!(aborts.len(), 1);
    match aborts[0] {
        Call::AbortBuild { slug, reason } => {
            assert_eq!(slug, "slug-lint");
            assert!(reason.contains("slug-test"));
            assert!(reason.contains("failed"));
        }
        other => panic!("unexpected call {other:?}"),
    }

    // Artifacts attempted only for the failed build.
    let listings: Vec<&Call> = calls
        .iter()
        .filter(|c| matches!(c, Call::ListArtifacts { .. }))
        .collect();
    assert_eq!(
        listings,
        vec![&Call::ListArtifacts {
            slug: "slug-test".to_string()
        }]
    );

    // The failed build was dropped from the active set after its terminal
    // poll and never re-queried.
    assert_eq!(api.poll_count("slug-test"), 2);
    assert_eq!(api.poll_count("slug-lint"), 1);
}

#[tokio::test]
async fn all_successful_builds_pass_without_side_effects() {
    let api = Arc::new(RecordingBuildService::new());
    api.push_start(Ok(started("slug-a", "unit")));
    api.push_start(Ok(started("slug-b", "ui")));
    api.script_build(
        "slug-a",
        vec![
            snapshot("slug-a", BuildStatus::Running, "in-progress", "unit"),
            snapshot("slug-a", BuildStatus::Succeeded, "success", "unit"),
        ],
    );
    api.script_build(
        "slug-b",
        vec![
            snapshot("slug-b", BuildStatus::Running, "in-progress", "ui"),
            snapshot("slug-b", BuildStatus::Succeeded, "success", "ui"),
        ],
    );

    let workflows = parse_workflows("unit\nui");
    let launched = start_all(api.clone(), &workflows, &Map::new(), "7", &[])
        .await
        .expect("fan-out failed");
    let slugs: Vec<String> = launched.iter().map(|b| b.build_slug.clone()).collect();

    let handler = Arc::new(BuildEventHandler::new(
        api.clone(),
        slugs.clone(),
        true,
        Some(PathBuf::from("/tmp/failed-artifacts")),
    ));
    let verdict = Supervisor::new(api.clone(), handler)
        .with_clock(Arc::new(InstantClock))
        .wait_for_builds(&slugs)
        .await
        .expect("supervision errored");

    assert_eq!(verdict, Verdict::AllSucceeded);
    assert!(api.calls().iter().all(|c| !matches!(
        c,
        Call::AbortBuild { .. } | Call::ListArtifacts { .. }
    )));
}
