//! Common test utilities for in-process HTTP testing with mocks.
//!
//! This module provides a test fixture that builds the real router over a
//! real pipeline and batch tracker, with the platform and session replaced by
//! mocks so no network or credential file is needed.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use reuploader_core::{
    config::PipelineConfig,
    testing::{MockPlatform, MockSession},
    BatchStatus, BatchTracker, Config, PublishPipeline,
};

/// Re-export fixtures for test convenience
pub use reuploader_core::testing::fixtures;

/// Test fixture for the plugin-facing HTTP protocol.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_upload() {
///     let fixture = TestFixture::with_platform(
///         MockPlatform::new().with_record(fixtures::asset_record(111, "Audio", 50)),
///     );
///
///     let response = fixture.post("/upload", json!({
///         "assetType": "Audio", "assetIds": [111], "creatorId": 9, "isGroup": false
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock platform - configure asset metadata and failures
    pub platform: Arc<MockPlatform>,
    /// Mock session - credential and security token
    pub session: Arc<MockSession>,
    /// The tracker shared with the handlers
    pub tracker: Arc<BatchTracker>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    /// Raw body text
    pub text: String,
    /// Body parsed as JSON, or Null if it is not JSON
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with an empty mock platform.
    pub fn new() -> Self {
        Self::with_platform(MockPlatform::new())
    }

    /// Create a test fixture around a configured mock platform.
    pub fn with_platform(platform: MockPlatform) -> Self {
        Self::build(platform, MockSession::new(), 5)
    }

    /// Create a test fixture with every part specified.
    pub fn build(platform: MockPlatform, session: MockSession, max_concurrent_jobs: usize) -> Self {
        let platform = Arc::new(platform);
        let session = Arc::new(session);
        let tracker = Arc::new(BatchTracker::new());

        let pipeline = Arc::new(PublishPipeline::new(
            Arc::clone(&session) as Arc<dyn reuploader_core::Session>,
            Arc::clone(&platform) as Arc<dyn reuploader_core::AssetPlatform>,
            &PipelineConfig {
                max_concurrent_jobs,
            },
        ));

        let state = Arc::new(reuploader_server::state::AppState::new(
            Config::default(),
            Arc::clone(&tracker),
            pipeline,
        ));

        // Create router
        let router = reuploader_server::api::create_router(state);

        Self {
            router,
            platform,
            session,
            tracker,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, Body::empty(), None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let bytes = serde_json::to_vec(&body).unwrap();
        self.request("POST", path, Body::from(bytes), Some("application/json"))
            .await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request(
            "POST",
            path,
            Body::from(body.to_string()),
            Some("application/json"),
        )
        .await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Body,
        content_type: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            request_builder = request_builder.header("Content-Type", content_type);
        }
        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, text, body }
    }

    /// Wait until the running batch has settled, without polling `/status`.
    pub async fn wait_until_settled(&self) {
        for _ in 0..200 {
            if self.tracker.status().await != BatchStatus::Running {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch did not settle in time");
    }

    /// Poll `/status` until "Done", collecting every mapping delivered.
    ///
    /// Panics if a mapping is delivered twice.
    pub async fn collect_results(&self) -> BTreeMap<String, String> {
        let mut results = BTreeMap::new();
        for _ in 0..500 {
            let response = self.get("/status").await;
            assert_eq!(response.status, StatusCode::OK);
            match response.text.as_str() {
                "Done" => return results,
                "Uploading" => tokio::time::sleep(Duration::from_millis(5)).await,
                "Idle" => panic!("status went Idle before Done"),
                _ => {
                    let mappings: BTreeMap<String, String> =
                        serde_json::from_value(response.body).expect("mapping object");
                    for (old_id, new_id) in mappings {
                        assert!(
                            results.insert(old_id.clone(), new_id).is_none(),
                            "{} delivered twice",
                            old_id
                        );
                    }
                }
            }
        }
        panic!("batch did not finish in time");
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
