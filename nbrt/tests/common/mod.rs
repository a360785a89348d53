//! Shared test utilities for nbrt integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use nbrt::config::NetworkSpecConfig;
use nbrt::{TemplateConfig, TemplateReconciler, ValidationPolicy};
use nbrt_client::{ClientConfig, NotebookClient, StaticToken};
use nbrt_mock::{MockServer, MockState, RecordedRequest};

pub const TOKEN: &str = "test-token";
pub const PROJECT: &str = "proj";
pub const LOCATION: &str = "australia-southeast1";

/// A mock API plus a reconciler pointed at it.
pub struct TestEnv {
    pub server: MockServer,
    pub reconciler: TemplateReconciler,
}

impl TestEnv {
    pub async fn spawn() -> Self {
        Self::spawn_with(ValidationPolicy::Advisory).await
    }

    pub async fn spawn_with(policy: ValidationPolicy) -> Self {
        let server = MockServer::spawn(TOKEN).await.expect("Failed to start mock");
        let config = ClientConfig::new(PROJECT, LOCATION).with_endpoint(server.endpoint());
        let client = NotebookClient::new(config, &StaticToken::new(TOKEN).unwrap())
            .await
            .expect("Failed to build client");
        let reconciler = TemplateReconciler::new(Arc::new(client)).with_policy(policy);
        Self { server, reconciler }
    }

    pub fn mock(&self) -> &MockState {
        self.server.state()
    }

    /// Recorded requests with the given HTTP method.
    pub async fn requests(&self, method: &str) -> Vec<RecordedRequest> {
        self.mock()
            .requests()
            .await
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    pub async fn shutdown(self) {
        self.server.shutdown().await;
    }
}

/// A configuration that passes every check.
pub fn config(display_name: &str) -> TemplateConfig {
    TemplateConfig {
        description: Some("integration test".to_string()),
        network_spec: Some(NetworkSpecConfig {
            enable_internet_access: Some(true),
            ..Default::default()
        }),
        ..TemplateConfig::new(display_name, "e2-standard-4")
    }
}
