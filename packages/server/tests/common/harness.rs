//! Test harness driving the router in-process.
//!
//! Requests go through `tower::ServiceExt::oneshot`, so no socket or database
//! is involved; every Base* dependency is an in-memory mock.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use server_core::kernel::test_dependencies::TestDependencies;
use server_core::kernel::ServerDeps;
use server_core::server::{build_router, RouterOptions};
use test_context::AsyncTestContext;
use tower::ServiceExt;

use super::Fixtures;

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestHarness {
    pub fixtures: Fixtures,
    pub deps: TestDependencies,
    pub server_deps: Arc<ServerDeps>,
    router: Router,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        let fixtures = Fixtures::new();
        let deps = TestDependencies::new()
            .mock_store(fixtures.store())
            .mock_shops(fixtures.shops())
            .mock_commerce(Fixtures::commerce());
        Self::with_deps(fixtures, deps)
    }

    async fn teardown(self) {}
}

impl TestHarness {
    pub fn with_deps(fixtures: Fixtures, deps: TestDependencies) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let server_deps = deps.clone().into_deps();
        let router = build_router(server_deps.clone(), &RouterOptions::default())
            .expect("router builds with default options");

        Self {
            fixtures,
            deps,
            server_deps,
            router,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

pub fn contents_uri(shop_name: &str, access_token: &str) -> String {
    format!("/contents?shopName={}&accessToken={}", shop_name, access_token)
}
