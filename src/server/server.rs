use anyhow::Result;
use std::{sync::Arc, time::Duration, time::Instant};

use tracing::{debug, error, info};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};

use super::live::live_messages;
use super::metrics::{
    metrics_handler, record_candidate_surfaced, record_match_action, record_message,
    record_profile_sync,
};
use super::responses::ApiError;
use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::{log_requests, state::*, ServerConfig};
use crate::conversation::{ConversationService, Message, MessageHub};
use crate::matching::{
    ActionOutcome, Candidate, MatchEngine, MatchRecord, MatchWithPeer, SwipeAction,
};
use crate::profile::{normalize, ListeningProfile, ProfileSource, RawListeningData};
use crate::store::{
    AuthTokenStore, FullStore, HandleTakenError, ListeningProfileStore, UserStore,
};
use crate::user::auth::{AuthToken, AuthTokenValue};
use crate::user::NewUser;

const MAX_HANDLE_LENGTH: usize = 32;
const PROFILE_SOURCE_NAME: &str = "spotify";

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub user_id: Option<usize>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Serialize)]
struct RegisterSuccessResponse {
    user_id: usize,
    token: String,
}

#[derive(Deserialize, Debug)]
struct SyncProfileBody {
    pub access_token: String,
}

#[derive(Deserialize, Debug)]
struct ActionBody {
    pub action: SwipeAction,
}

#[derive(Deserialize, Debug)]
struct PostMessageBody {
    pub content: String,
}

fn validate_handle(handle: &str) -> Result<(), ApiError> {
    if handle.is_empty() || handle.chars().count() > MAX_HANDLE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Handle must be 1 to {} characters long",
            MAX_HANDLE_LENGTH
        )));
    }
    if !handle
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Err(ApiError::bad_request(
            "Handle may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

fn handle_taken(handle: &str) -> ApiError {
    ApiError::new(
        StatusCode::CONFLICT,
        "handle_taken",
        format!("Handle {} is already taken", handle),
    )
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        user_id: session.map(|s| s.user_id),
    };
    Json(stats)
}

async fn register(
    State(store): State<GuardedStore>,
    Json(mut body): Json<NewUser>,
) -> Result<Response, ApiError> {
    body.handle = body.handle.trim().to_string();
    validate_handle(&body.handle)?;
    if store.get_user_id(&body.handle)?.is_some() {
        return Err(handle_taken(&body.handle));
    }

    // A concurrent registration may still win the handle after the check.
    let user_id = match store.create_user(&body) {
        Ok(user_id) => user_id,
        Err(err) if err.downcast_ref::<HandleTakenError>().is_some() => {
            return Err(handle_taken(&body.handle))
        }
        Err(err) => return Err(err.into()),
    };
    let auth_token = AuthToken::new_for_user(user_id);
    store.add_auth_token(&auth_token)?;
    info!("Registered user {} ({})", user_id, body.handle);

    let cookie = Cookie::build(Cookie::new(
        COOKIE_SESSION_TOKEN_KEY,
        auth_token.value.0.clone(),
    ))
    .path("/")
    .http_only(true)
    .same_site(SameSite::Lax)
    .build();

    let response_body = RegisterSuccessResponse {
        user_id,
        token: auth_token.value.0,
    };
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(response_body),
    )
        .into_response())
}

async fn logout(State(store): State<GuardedStore>, session: Session) -> Result<Response, ApiError> {
    store.delete_auth_token(&AuthTokenValue(session.token))?;
    debug!("User {} logged out", session.user_id);

    let cookie = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1)) // Expire it in the past
        .same_site(SameSite::Lax)
        .build();

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]).into_response())
}

async fn sync_profile(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<SyncProfileBody>,
) -> Result<Json<ListeningProfile>, ApiError> {
    if body.access_token.trim().is_empty() {
        return Err(ApiError::bad_request("access_token is required"));
    }

    let fetched = match state
        .profile_source
        .fetch_listening_data(body.access_token.trim())
        .await
    {
        Ok(fetched) => fetched,
        Err(err) => {
            record_profile_sync(PROFILE_SOURCE_NAME, "failed");
            return Err(err.into());
        }
    };

    let profile = normalize(&fetched.data);
    state
        .store
        .save_listening_profile(session.user_id, &profile)?;
    state.store.update_source_account(
        session.user_id,
        &fetched.account.external_id,
        &fetched.account.display_name,
        fetched.account.avatar_url.as_deref(),
    )?;
    record_profile_sync(PROFILE_SOURCE_NAME, "ok");
    info!(
        "Synced profile of user {}: {} artists, {} genres",
        session.user_id,
        profile.top_artists.len(),
        profile.top_genres.len()
    );
    Ok(Json(profile))
}

async fn put_profile(
    session: Session,
    State(store): State<GuardedStore>,
    Json(raw): Json<RawListeningData>,
) -> Result<Json<ListeningProfile>, ApiError> {
    let profile = normalize(&raw);
    store.save_listening_profile(session.user_id, &profile)?;
    record_profile_sync("upload", "ok");
    Ok(Json(profile))
}

async fn get_profile(
    session: Session,
    State(store): State<GuardedStore>,
) -> Result<Json<ListeningProfile>, ApiError> {
    match store.get_listening_profile(session.user_id)? {
        Some(profile) => Ok(Json(profile)),
        None => Err(ApiError::not_found("No listening profile stored yet")),
    }
}

async fn discover_next(
    session: Session,
    State(engine): State<GuardedMatchEngine>,
) -> Result<Json<Candidate>, ApiError> {
    let candidate = engine.surface_candidate(session.user_id)?;
    record_candidate_surfaced();
    Ok(Json(candidate))
}

async fn record_action(
    session: Session,
    State(engine): State<GuardedMatchEngine>,
    Path(peer_id): Path<usize>,
    Json(body): Json<ActionBody>,
) -> Result<Json<ActionOutcome>, ApiError> {
    let outcome = engine.record_action(session.user_id, peer_id, body.action)?;
    record_match_action(body.action.as_str(), outcome.matched);
    Ok(Json(outcome))
}

async fn list_matches(
    session: Session,
    State(engine): State<GuardedMatchEngine>,
) -> Result<Json<Vec<MatchWithPeer>>, ApiError> {
    Ok(Json(engine.list_my_matches(session.user_id)?))
}

async fn get_match(
    session: Session,
    State(engine): State<GuardedMatchEngine>,
    Path(peer_id): Path<usize>,
) -> Result<Json<MatchRecord>, ApiError> {
    Ok(Json(engine.get_match(session.user_id, peer_id)?))
}

async fn list_messages(
    session: Session,
    State(conversations): State<GuardedConversations>,
    Path(peer_id): Path<usize>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(conversations.list_messages(session.user_id, peer_id)?))
}

async fn post_message(
    session: Session,
    State(conversations): State<GuardedConversations>,
    Path(peer_id): Path<usize>,
    Json(body): Json<PostMessageBody>,
) -> Result<Response, ApiError> {
    let message = conversations
        .post_message(session.user_id, peer_id, &body.content)
        .await?;
    record_message();
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

impl ServerState {
    fn new(
        config: ServerConfig,
        store: GuardedStore,
        profile_source: GuardedProfileSource,
    ) -> ServerState {
        let hub = Arc::new(MessageHub::new());
        ServerState {
            config,
            start_time: Instant::now(),
            match_engine: Arc::new(MatchEngine::new(store.clone())),
            conversations: Arc::new(ConversationService::new(store.clone(), hub)),
            store,
            profile_source,
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    store: Arc<dyn FullStore>,
    profile_source: Arc<dyn ProfileSource>,
) -> Result<Router> {
    let state = ServerState::new(config, store, profile_source);

    let auth_routes: Router = Router::new()
        .route("/register", post(register))
        .route("/logout", get(logout))
        .with_state(state.clone());

    let profile_routes: Router = Router::new()
        .route("/", get(get_profile).put(put_profile))
        .route("/sync", post(sync_profile))
        .with_state(state.clone());

    let discover_routes: Router = Router::new()
        .route("/next", post(discover_next))
        .route("/{peer_id}/action", post(record_action))
        .with_state(state.clone());

    let match_routes: Router = Router::new()
        .route("/", get(list_matches))
        .route("/{peer_id}", get(get_match))
        .route(
            "/{peer_id}/messages",
            get(list_messages).post(post_message),
        )
        .route("/{peer_id}/live", get(live_messages))
        .with_state(state.clone());

    let app: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone())
        .nest("/v1/auth", auth_routes)
        .nest("/v1/profile", profile_routes)
        .nest("/v1/discover", discover_routes)
        .nest("/v1/matches", match_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_server(
    config: ServerConfig,
    store: Arc<dyn FullStore>,
    profile_source: Arc<dyn ProfileSource>,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, store, profile_source)?;

    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port)).await?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, make_metrics_app()).await {
            error!("Metrics server stopped: {}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    Ok(axum::serve(listener, app).await?)
}
