//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per server endpoint. When API routes or
//! request formats change, update only this file.

#![allow(dead_code)]

use super::constants::*;
use super::fixtures::raw_profile;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type LiveSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
    /// Set once the client registered a user
    pub user_id: Option<usize>,
    pub token: Option<String>,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            user_id: None,
            token: None,
        }
    }

    /// Creates a client with a freshly registered user
    ///
    /// # Panics
    ///
    /// Panics if the registration fails.
    pub async fn registered(base_url: String, handle: &str) -> Self {
        let mut client = Self::new(base_url);

        let response = client.register(handle).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Registration of {} failed",
            handle
        );
        let body: Value = response.json().await.expect("Invalid register response");
        client.user_id = body["user_id"].as_u64().map(|id| id as usize);
        client.token = body["token"].as_str().map(str::to_string);

        client
    }

    /// Like [`TestClient::registered`], with a listening profile already uploaded
    pub async fn with_profile(base_url: String, handle: &str, profile: Value) -> Self {
        let client = Self::registered(base_url, handle).await;
        let response = client.put_profile(&profile).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        client
    }

    /// Two users with overlapping profiles who surfaced and liked each other
    pub async fn matched_pair(base_url: String) -> (Self, Self) {
        let alice = Self::with_profile(
            base_url.clone(),
            "alice",
            raw_profile(&["a1", "a2"], &["shoegaze"], 0.5),
        )
        .await;
        let bob = Self::with_profile(
            base_url,
            "bob",
            raw_profile(&["a2", "a3"], &["shoegaze"], 0.6),
        )
        .await;

        for client in [&alice, &bob] {
            let response = client.discover_next().await;
            assert_eq!(response.status(), reqwest::StatusCode::OK);
        }
        assert_eq!(alice.act(bob.id(), "like").await.status(), reqwest::StatusCode::OK);
        let outcome: Value = bob.act(alice.id(), "like").await.json().await.unwrap();
        assert_eq!(outcome["matched"], true);

        (alice, bob)
    }

    pub fn id(&self) -> usize {
        self.user_id.expect("Client has no registered user")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// GET /
    pub async fn get_home(&self) -> Response {
        self.client
            .get(self.url("/"))
            .send()
            .await
            .expect("Home request failed")
    }

    /// POST /v1/auth/register
    pub async fn register(&self, handle: &str) -> Response {
        self.client
            .post(self.url("/v1/auth/register"))
            .json(&json!({ "handle": handle, "bio": format!("I am {}", handle) }))
            .send()
            .await
            .expect("Register request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(self.url("/v1/auth/logout"))
            .send()
            .await
            .expect("Logout request failed")
    }

    // ========================================================================
    // Profile Endpoints
    // ========================================================================

    /// PUT /v1/profile
    pub async fn put_profile(&self, raw: &Value) -> Response {
        self.client
            .put(self.url("/v1/profile"))
            .json(raw)
            .send()
            .await
            .expect("Put profile request failed")
    }

    /// POST /v1/profile/sync
    pub async fn sync_profile(&self, access_token: &str) -> Response {
        self.client
            .post(self.url("/v1/profile/sync"))
            .json(&json!({ "access_token": access_token }))
            .send()
            .await
            .expect("Sync profile request failed")
    }

    /// GET /v1/profile
    pub async fn get_profile(&self) -> Response {
        self.client
            .get(self.url("/v1/profile"))
            .send()
            .await
            .expect("Get profile request failed")
    }

    // ========================================================================
    // Discovery and Match Endpoints
    // ========================================================================

    /// POST /v1/discover/next
    pub async fn discover_next(&self) -> Response {
        self.client
            .post(self.url("/v1/discover/next"))
            .send()
            .await
            .expect("Discover request failed")
    }

    /// POST /v1/discover/{peer_id}/action
    pub async fn act(&self, peer_id: usize, action: &str) -> Response {
        self.client
            .post(self.url(&format!("/v1/discover/{}/action", peer_id)))
            .json(&json!({ "action": action }))
            .send()
            .await
            .expect("Action request failed")
    }

    /// GET /v1/matches
    pub async fn list_matches(&self) -> Response {
        self.client
            .get(self.url("/v1/matches"))
            .send()
            .await
            .expect("List matches request failed")
    }

    /// GET /v1/matches/{peer_id}
    pub async fn get_match(&self, peer_id: usize) -> Response {
        self.client
            .get(self.url(&format!("/v1/matches/{}", peer_id)))
            .send()
            .await
            .expect("Get match request failed")
    }

    // ========================================================================
    // Conversation Endpoints
    // ========================================================================

    /// GET /v1/matches/{peer_id}/messages
    pub async fn list_messages(&self, peer_id: usize) -> Response {
        self.client
            .get(self.url(&format!("/v1/matches/{}/messages", peer_id)))
            .send()
            .await
            .expect("List messages request failed")
    }

    /// POST /v1/matches/{peer_id}/messages
    pub async fn post_message(&self, peer_id: usize, content: &str) -> Response {
        self.client
            .post(self.url(&format!("/v1/matches/{}/messages", peer_id)))
            .json(&json!({ "content": content }))
            .send()
            .await
            .expect("Post message request failed")
    }

    /// Opens the live socket of the conversation with `peer_id`.
    ///
    /// Returns the HTTP status as an error when the upgrade is refused.
    pub async fn connect_live(&self, peer_id: usize) -> Result<LiveSocket, u16> {
        let ws_url = self.base_url.replace("http://", "ws://")
            + &format!("/v1/matches/{}/live", peer_id);
        let mut request = ws_url
            .into_client_request()
            .expect("Failed to build WebSocket request");
        if let Some(token) = &self.token {
            request.headers_mut().insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {}", token)).expect("Invalid token"),
            );
        }

        match connect_async(request).await {
            Ok((ws_stream, _)) => Ok(ws_stream),
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                Err(response.status().as_u16())
            }
            Err(err) => panic!("Failed to connect to live socket: {}", err),
        }
    }
}
