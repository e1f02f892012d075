//! End-to-end tests for registration, profiles, discovery and matching

mod common;

use common::{raw_profile, TestClient, TestServer, VALID_ACCESS_TOKEN};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_home_reports_session_user() {
    let server = TestServer::spawn().await;

    let anonymous = TestClient::new(server.base_url.clone());
    let stats: Value = anonymous.get_home().await.json().await.unwrap();
    assert!(stats["user_id"].is_null());
    assert!(stats["uptime"].as_str().unwrap().starts_with("0d"));

    let client = TestClient::registered(server.base_url.clone(), "ana").await;
    let stats: Value = client.get_home().await.json().await.unwrap();
    assert_eq!(stats["user_id"].as_u64(), Some(client.id() as u64));
}

#[tokio::test]
async fn test_duplicate_handle_is_conflict() {
    let server = TestServer::spawn().await;
    let _first = TestClient::registered(server.base_url.clone(), "taken").await;

    let second = TestClient::new(server.base_url.clone());
    let response = second.register("taken").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let server = TestServer::spawn().await;
    let client = TestClient::registered(server.base_url.clone(), "leaving").await;

    assert_eq!(client.list_matches().await.status(), StatusCode::OK);
    assert_eq!(client.logout().await.status(), StatusCode::OK);
    assert_eq!(client.list_matches().await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sync_profile_from_source() {
    let server = TestServer::spawn().await;
    let client = TestClient::registered(server.base_url.clone(), "listener").await;

    assert_eq!(client.get_profile().await.status(), StatusCode::NOT_FOUND);

    let response = client.sync_profile("expired-token").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "upstream_unavailable");

    let response = client.sync_profile(VALID_ACCESS_TOKEN).await;
    assert_eq!(response.status(), StatusCode::OK);

    let profile: Value = client.get_profile().await.json().await.unwrap();
    assert_eq!(profile["top_artists"].as_array().unwrap().len(), 2);
    assert_eq!(profile["top_genres"][0]["genre"], "art rock");
    assert_eq!(profile["top_genres"][0]["count"], 2);
    // The unresolved sample does not drag the averages down
    assert_eq!(profile["audio_features"]["energy"], 0.6);
}

#[tokio::test]
async fn test_discover_scores_candidates_once() {
    let server = TestServer::spawn().await;
    let alice = TestClient::with_profile(
        server.base_url.clone(),
        "alice",
        raw_profile(&["x", "y", "z"], &["rock"], 0.5),
    )
    .await;
    let bob = TestClient::with_profile(
        server.base_url.clone(),
        "bob",
        raw_profile(&["y", "z", "w"], &["rock"], 0.7),
    )
    .await;
    // Users without a profile are never surfaced
    let _carol = TestClient::registered(server.base_url.clone(), "carol").await;

    let response = alice.discover_next().await;
    assert_eq!(response.status(), StatusCode::OK);
    let candidate: Value = response.json().await.unwrap();
    assert_eq!(candidate["user"]["id"].as_u64(), Some(bob.id() as u64));
    assert_eq!(candidate["user"]["handle"], "bob");
    assert_eq!(candidate["compatibility_details"]["artist_overlap"], 50);
    assert_eq!(candidate["compatibility_details"]["genre_match"], 100);
    assert_eq!(candidate["compatibility_details"]["audio_similarity"], 80);
    // 0.4 * 50 + 0.4 * 100 + 0.2 * 80
    assert_eq!(candidate["compatibility_score"], 76);

    let response = alice.discover_next().await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let record: Value = alice.get_match(bob.id()).await.json().await.unwrap();
    assert_eq!(record["status"], "pending");
}

#[tokio::test]
async fn test_mutual_likes_match() {
    let server = TestServer::spawn().await;
    let (alice, bob) = TestClient::matched_pair(server.base_url.clone()).await;

    for (me, peer) in [(&alice, &bob), (&bob, &alice)] {
        let record: Value = me.get_match(peer.id()).await.json().await.unwrap();
        assert_eq!(record["status"], "matched");
        assert_eq!(record["user_action"], "like");
        assert_eq!(record["matched_user_action"], "like");

        let matches: Value = me.list_matches().await.json().await.unwrap();
        let matches = matches.as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["peer"]["id"].as_u64(), Some(peer.id() as u64));
    }

    // Liking a matched record is not a legal transition
    let response = alice.act(bob.id(), "like").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_pass_is_terminal() {
    let server = TestServer::spawn().await;
    let alice = TestClient::with_profile(
        server.base_url.clone(),
        "alice",
        raw_profile(&["x"], &["jazz"], 0.2),
    )
    .await;
    let bob = TestClient::with_profile(
        server.base_url.clone(),
        "bob",
        raw_profile(&["x"], &["jazz"], 0.2),
    )
    .await;

    assert_eq!(alice.discover_next().await.status(), StatusCode::OK);
    assert_eq!(bob.discover_next().await.status(), StatusCode::OK);

    let outcome: Value = alice.act(bob.id(), "pass").await.json().await.unwrap();
    assert_eq!(outcome["status"], "passed");

    let response = alice.act(bob.id(), "like").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "illegal_transition");

    // Bob's like never produces a match against a pass
    let outcome: Value = bob.act(alice.id(), "like").await.json().await.unwrap();
    assert_eq!(outcome["matched"], false);
    assert_eq!(outcome["status"], "liked");

    let matches: Value = bob.list_matches().await.json().await.unwrap();
    assert!(matches.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_action_requires_surfaced_candidate() {
    let server = TestServer::spawn().await;
    let alice = TestClient::registered(server.base_url.clone(), "alice").await;
    let bob = TestClient::registered(server.base_url.clone(), "bob").await;

    let response = alice.act(bob.id(), "like").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(alice.get_match(bob.id()).await.status(), StatusCode::NOT_FOUND);

    let response = alice.act(bob.id(), "superlike").await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_concurrent_likes_match_both_sides() {
    let server = TestServer::spawn().await;
    let alice = TestClient::with_profile(
        server.base_url.clone(),
        "alice",
        raw_profile(&["x", "y"], &["pop"], 0.5),
    )
    .await;
    let bob = TestClient::with_profile(
        server.base_url.clone(),
        "bob",
        raw_profile(&["x"], &["pop"], 0.5),
    )
    .await;
    assert_eq!(alice.discover_next().await.status(), StatusCode::OK);
    assert_eq!(bob.discover_next().await.status(), StatusCode::OK);

    let (a, b) = tokio::join!(alice.act(bob.id(), "like"), bob.act(alice.id(), "like"));
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    let a: Value = a.json().await.unwrap();
    let b: Value = b.json().await.unwrap();
    assert!(a["matched"] == true || b["matched"] == true);

    for (me, peer) in [(&alice, &bob), (&bob, &alice)] {
        let record: Value = me.get_match(peer.id()).await.json().await.unwrap();
        assert_eq!(record["status"], "matched");
    }
}
