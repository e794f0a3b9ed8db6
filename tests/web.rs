// tests/web.rs
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use ntm_updater::version_source::{VersionSource, VersionStrategy};
use ntm_updater::versionweb::{build_version_router, NO_STORE};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt; // for .oneshot()

fn file_router(path: PathBuf) -> Router {
    let source = VersionSource::new(
        VersionStrategy::VersionFile {
            path,
            default_version: "1.0.0".to_string(),
        },
        "production",
    );
    build_version_router(Arc::new(source))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, header::HeaderMap, serde_json::Value) {
    let req = Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap();
    (status, headers, json)
}

#[tokio::test]
async fn version_endpoint_serves_build_metadata() {
    let temp_dir = tempfile::tempdir().expect("temp dir should be created");
    let path = temp_dir.path().join("version.json");
    std::fs::write(
        &path,
        r#"{"version":"build-2000","timestamp":"2025-05-05T05:05:05.000Z","buildNumber":2000}"#,
    )
    .unwrap();

    let (status, _, json) = get_json(file_router(path), "/api/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], "build-2000");
    assert_eq!(json["timestamp"], "2025-05-05T05:05:05.000Z");
    assert_eq!(json["buildNumber"], 2000);
    assert_eq!(json["environment"], "production");
    assert_eq!(json["source"], "version-file");
}

#[tokio::test]
async fn version_endpoint_disables_caching() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (_, headers, _) = get_json(file_router(temp_dir.path().join("missing.json")), "/api/version").await;

    assert_eq!(headers[header::CACHE_CONTROL], NO_STORE);
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::EXPIRES], "0");
}

#[tokio::test]
async fn missing_metadata_still_answers_200() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (status, _, json) =
        get_json(file_router(temp_dir.path().join("missing.json")), "/api/version").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["version"].as_str().unwrap().starts_with("1.0.0-"));
    assert!(json.get("buildNumber").is_none());
    assert_eq!(json["source"], "version-file");
}

#[tokio::test]
async fn hosted_commit_is_reported_verbatim() {
    let source = VersionSource::new(
        VersionStrategy::HostedCommit {
            commit: "9f8e7d6c".to_string(),
        },
        "preview",
    );
    let app = build_version_router(Arc::new(source));

    let (status, _, json) = get_json(app, "/api/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], "9f8e7d6c");
    assert_eq!(json["environment"], "preview");
    assert_eq!(json["source"], "vercel-git");
}

#[tokio::test]
async fn healthz_reports_ok() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (status, _, json) = get_json(file_router(temp_dir.path().join("v.json")), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}
