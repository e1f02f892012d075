//! Live delivery of new messages of a conversation over WebSocket.
//!
//! The socket is only a push channel: clients post through the HTTP
//! endpoint and receive every message of the pair here, their own included.

use std::collections::HashSet;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::metrics::{live_connection_closed, live_connection_opened};
use super::responses::ApiError;
use super::session::Session;
use super::state::GuardedConversations;
use crate::conversation::{Message, PairKey};

pub async fn live_messages(
    ws: WebSocketUpgrade,
    session: Session,
    State(conversations): State<GuardedConversations>,
    Path(peer_id): Path<usize>,
) -> Response {
    if let Err(err) = conversations.ensure_matched(session.user_id, peer_id) {
        return ApiError::from(err).into_response();
    }

    let pair = PairKey::new(session.user_id, peer_id);
    // Subscribe before the upgrade so that nothing posted meanwhile is missed.
    let receiver = conversations.hub().subscribe(pair).await;
    let user_id = session.user_id;

    debug!("Live upgrade for user {} on pair {:?}", user_id, pair);
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, pair, receiver, conversations))
}

async fn handle_socket(
    socket: WebSocket,
    user_id: usize,
    pair: PairKey,
    receiver: broadcast::Receiver<Message>,
    conversations: GuardedConversations,
) {
    live_connection_opened();
    let (ws_sink, ws_stream) = socket.split();

    let outgoing_handle = tokio::spawn(forward_messages(ws_sink, receiver));
    process_incoming(ws_stream, user_id).await;

    debug!("Live connection closed for user {}", user_id);
    outgoing_handle.abort();
    // The receiver is only dropped once the aborted task is gone.
    let _ = outgoing_handle.await;
    conversations.hub().release(pair).await;
    live_connection_closed();
}

/// Forwards the pair's messages to the socket, skipping ids already sent.
async fn forward_messages(
    mut ws_sink: futures::stream::SplitSink<WebSocket, WsMessage>,
    mut receiver: broadcast::Receiver<Message>,
) {
    let mut sent: HashSet<Uuid> = HashSet::new();
    loop {
        let message = match receiver.recv().await {
            Ok(message) => message,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Live receiver lagged, {} messages skipped", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if !sent.insert(message.id) {
            continue;
        }
        match serde_json::to_string(&message) {
            Ok(json) => {
                if ws_sink.send(WsMessage::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => error!("Failed to serialize live message: {}", e),
        }
    }
}

async fn process_incoming(mut ws_stream: futures::stream::SplitStream<WebSocket>, user_id: usize) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(WsMessage::Close(_)) => break,
            // Pings are answered by axum.
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {}
            Ok(_) => debug!("Ignoring inbound live frame from user {}", user_id),
            Err(e) => {
                debug!("Live socket error for user {}: {}", user_id, e);
                break;
            }
        }
    }
}
