//! nbrt-mock: in-memory fake of the Vertex AI notebook runtime template API.
//!
//! Serves list / create / patch / delete under `/v1beta1/projects/*/locations/*`
//! with the same quirks as the real service: list is the only read, create
//! answers with an operation envelope, and PATCH only accepts whitelisted
//! mask paths. Every request is recorded for inspection.

pub mod routes;
pub mod state;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::error;

pub use routes::router;
pub use state::{CannedResponse, DEFAULT_PATCHABLE, MockState, RecordedRequest};

/// A mock server bound to an ephemeral local port.
pub struct MockServer {
    addr: SocketAddr,
    state: MockState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Bind `127.0.0.1:0` and serve in a background task.
    pub async fn spawn(token: &str) -> std::io::Result<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0)), token).await
    }

    pub async fn bind(addr: SocketAddr, token: &str) -> std::io::Result<Self> {
        let state = MockState::new(token);
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(state.clone());

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Mock server error");
            }
        });

        Ok(Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL including the API version, suitable as a client endpoint.
    pub fn endpoint(&self) -> String {
        format!("http://{}/v1beta1", self.addr)
    }

    pub fn state(&self) -> &MockState {
        &self.state
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
    }
}
