//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own database and a stub
//! listening data source, so no test talks to the network.

use super::constants::*;
use super::fixtures::stub_listening_data;
use async_trait::async_trait;
use ibeshi_server::profile::{
    FetchedListeningData, ProfileSource, ProfileSourceError, SourceAccount,
};
use ibeshi_server::store::FullStore;
use ibeshi_server::{make_app, RequestsLoggingLevel, ServerConfig, SqliteStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Accepts only [`VALID_ACCESS_TOKEN`], like an upstream API rejecting an
/// expired token.
struct StubProfileSource;

#[async_trait]
impl ProfileSource for StubProfileSource {
    async fn fetch_listening_data(
        &self,
        access_token: &str,
    ) -> Result<FetchedListeningData, ProfileSourceError> {
        if access_token != VALID_ACCESS_TOKEN {
            return Err(ProfileSourceError::Status {
                endpoint: "/me".to_string(),
                status: 401,
            });
        }
        Ok(FetchedListeningData {
            account: SourceAccount {
                external_id: STUB_SPOTIFY_ID.to_string(),
                display_name: STUB_DISPLAY_NAME.to_string(),
                email: None,
                avatar_url: None,
            },
            data: stub_listening_data(),
        })
    }
}

/// Test server instance with an isolated database
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Store for direct database access in tests
    #[allow(dead_code)]
    pub store: Arc<dyn FullStore>,

    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created, the port cannot be bound or
    /// the server doesn't become ready within the timeout.
    pub async fn spawn() -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let store: Arc<dyn FullStore> = Arc::new(
            SqliteStore::new(temp_db_dir.path().join("ibeshi.db"))
                .expect("Failed to open store"),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            metrics_port: 0,
        };
        let app = make_app(config, store.clone(), Arc::new(StubProfileSource))
            .expect("Failed to build app");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            store,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
