//! WebSocket connection handlers and the inbound protocol dispatcher.
//!
//! Each connection runs two tasks: a receive loop that parses inbound frames
//! into [`ClientCommand`]s and dispatches them, and a pusher loop that drains
//! the connection's outbound channel into the socket (FIFO per recipient).
//! A third `select!` branch watches the close signal whose sender half lives
//! in the registry entry — when the entry is dropped (session replaced, or
//! evicted by the liveness sweep) the socket is force-closed and the same
//! disconnect cleanup runs as for a graceful close.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::{Mutex, mpsc, watch};

use shoudan_shared::time::{now_utc_millis, timestamp_to_rfc3339};

use crate::{
    domain::{
        ClientCommand, Connection, ConnectionHandle, ConnectionId, ConnectionRegistry,
        ConversationId, MessageId, PusherChannel, ServerEvent, Timestamp, UserId,
    },
    ui::state::AppState,
    usecase::JoinConversationError,
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, receiver) = socket.split();

    // Send connection acknowledgment before anything else
    let ack = ServerEvent::Connection {
        status: "connected".to_string(),
        timestamp: now_rfc3339(),
    };
    if sender.send(Message::Text(ack.to_json().into())).await.is_err() {
        return;
    }
    tracing::info!("New WebSocket connection established");

    // Create a channel for this connection to receive events
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    // Close signal: the sender half moves into the registry entry at
    // authentication time, so dropping the entry force-closes this socket
    let (close_tx, mut close_rx) = watch::channel(());
    let connection = Arc::new(Mutex::new(Connection::new(ConnectionId::generate())));

    // Spawn a task to push events from the hub to this connection
    let mut send_task = pusher_loop(rx, sender);

    // Spawn a task to receive and dispatch frames from this connection
    let mut recv_task = tokio::spawn(dispatch_loop(
        receiver,
        state.clone(),
        connection.clone(),
        tx,
        close_tx,
    ));

    // If any one of the tasks completes, abort the other. The third branch
    // fires when the registry entry holding our close sender is dropped.
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
        _ = close_rx.changed() => {
            tracing::info!("Connection force-closed (session replaced or evicted)");
            recv_task.abort();
            send_task.abort();
        }
    }

    // Always run the leave-room / typing-stop cleanup before discarding the
    // connection, regardless of how it ended
    run_disconnect_cleanup(&state, &connection).await;
}

/// Spawns a task that receives events from the rx channel and pushes them to
/// the WebSocket sender.
///
/// This handles the outbound flow: events from the hub (via rx channel) are
/// delivered to this connection in the order they were enqueued.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Receive loop: parse each inbound frame and dispatch it.
async fn dispatch_loop(
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    state: Arc<AppState>,
    connection: Arc<Mutex<Connection>>,
    tx: PusherChannel,
    close_tx: watch::Sender<()>,
) {
    // Kept here until the connection authenticates, then moved into the
    // registry entry together with the sender
    let mut close_slot = Some(close_tx);

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                tracing::debug!("Received frame: {}", text);

                let command = match ClientCommand::parse(&text) {
                    Ok(command) => command,
                    Err(e) => {
                        // Malformed frame or unknown type: reply with an
                        // error event, keep the connection open
                        tracing::warn!("Rejected inbound frame: {}", e);
                        send_self(&tx, error_event("Invalid message format"));
                        continue;
                    }
                };

                dispatch_command(&state, &connection, &tx, &mut close_slot, command).await;
            }
            Message::Ping(_) => {
                tracing::debug!("Received ping");
                // Ping/pong is handled automatically by the WebSocket protocol
            }
            Message::Close(_) => {
                tracing::info!("Client requested close");
                break;
            }
            _ => {}
        }
    }
}

/// Route one parsed command to its handler.
async fn dispatch_command(
    state: &Arc<AppState>,
    connection: &Arc<Mutex<Connection>>,
    tx: &PusherChannel,
    close_slot: &mut Option<watch::Sender<()>>,
    command: ClientCommand,
) {
    match command {
        ClientCommand::Authenticate {
            user_id,
            session_id,
        } => handle_authenticate(state, connection, tx, close_slot, user_id, session_id).await,
        ClientCommand::JoinConversation { conversation_id } => {
            handle_join_conversation(state, connection, tx, conversation_id).await
        }
        ClientCommand::LeaveConversation {} => {
            handle_leave_conversation(state, connection, tx).await
        }
        ClientCommand::TypingStart {} => handle_typing(state, connection, tx, true).await,
        ClientCommand::TypingStop {} => handle_typing(state, connection, tx, false).await,
        ClientCommand::MessageSent {
            conversation_id,
            message_id,
            message_data,
        } => handle_message_sent(state, connection, tx, conversation_id, message_id, message_data)
            .await,
        ClientCommand::MessageRead {
            conversation_id,
            message_id,
        } => handle_message_read(state, connection, tx, conversation_id, message_id).await,
        ClientCommand::Heartbeat {} => handle_heartbeat(state, connection, tx).await,
    }
}

async fn handle_authenticate(
    state: &Arc<AppState>,
    connection: &Arc<Mutex<Connection>>,
    tx: &PusherChannel,
    close_slot: &mut Option<watch::Sender<()>>,
    user_id: String,
    session_id: Option<String>,
) {
    // Session/token validation is owned by the external session layer; the
    // hub binds the connection to the claimed identity
    let user_id = match UserId::try_from(user_id) {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::warn!("Authentication rejected: {}", e);
            send_self(tx, error_event("Authentication failed"));
            return;
        }
    };
    if let Some(session_id) = &session_id {
        tracing::debug!(
            "Session '{}' presented for user '{}'",
            session_id,
            user_id.as_str()
        );
    }

    let mut conn = connection.lock().await;
    if conn.authenticate(user_id.clone()).is_err() {
        send_self(tx, error_event("Already authenticated"));
        return;
    }

    let Some(close) = close_slot.take() else {
        // FSM 側で再認証を弾いているため到達しない
        send_self(tx, error_event("Authentication failed"));
        return;
    };

    let now = Timestamp::new(now_utc_millis());
    let handle = ConnectionHandle {
        connection_id: conn.id().clone(),
        sender: tx.clone(),
        close,
        connected_at: now,
        last_heartbeat: now,
    };
    drop(conn);

    state
        .authenticate_usecase
        .execute(user_id.clone(), handle)
        .await;
    tracing::info!("User '{}' authenticated", user_id.as_str());

    send_self(
        tx,
        ServerEvent::Authenticated {
            user_id: user_id.into_string(),
            timestamp: now_rfc3339(),
        },
    );
}

async fn handle_join_conversation(
    state: &Arc<AppState>,
    connection: &Arc<Mutex<Connection>>,
    tx: &PusherChannel,
    conversation_id: String,
) {
    let mut conn = connection.lock().await;
    let Some(user_id) = conn.user_id().cloned() else {
        send_self(tx, error_event("Not authenticated"));
        return;
    };

    let conversation_id = match ConversationId::try_from(conversation_id) {
        Ok(conversation_id) => conversation_id,
        Err(e) => {
            tracing::warn!("Rejected join with invalid conversation id: {}", e);
            send_self(tx, error_event("Invalid conversation id"));
            return;
        }
    };

    // Joining while in another room implicitly leaves the old room first
    if let Some(current) = conn.current_conversation().cloned() {
        if current != conversation_id {
            let targets = state
                .leave_conversation_usecase
                .execute(&user_id, &current)
                .await;
            let left = user_left_event(&user_id, &current);
            if let Err(e) = state
                .leave_conversation_usecase
                .broadcast_user_left(targets, &left.to_json())
                .await
            {
                tracing::warn!("Failed to broadcast user-left: {}", e);
            }
            let _ = conn.exit_conversation();
            tracing::info!(
                "User '{}' implicitly left conversation '{}'",
                user_id.as_str(),
                current.as_str()
            );
        }
    }

    match state
        .join_conversation_usecase
        .execute(&user_id, &conversation_id)
        .await
    {
        Ok(targets) => {
            if conn.enter_conversation(conversation_id.clone()).is_err() {
                // 認証済みであることは上で確認しているため到達しない
                return;
            }
            drop(conn);

            send_self(
                tx,
                ServerEvent::ConversationJoined {
                    conversation_id: conversation_id.as_str().to_string(),
                    timestamp: now_rfc3339(),
                },
            );

            let joined = ServerEvent::UserJoinedConversation {
                user_id: user_id.as_str().to_string(),
                conversation_id: conversation_id.as_str().to_string(),
                timestamp: now_rfc3339(),
            };
            if let Err(e) = state
                .join_conversation_usecase
                .broadcast_user_joined(targets, &joined.to_json())
                .await
            {
                tracing::warn!("Failed to broadcast user-joined: {}", e);
            }

            tracing::info!(
                "User '{}' joined conversation '{}'",
                user_id.as_str(),
                conversation_id.as_str()
            );
        }
        Err(JoinConversationError::AccessDenied(_)) => {
            tracing::warn!(
                "User '{}' denied access to conversation '{}'",
                user_id.as_str(),
                conversation_id.as_str()
            );
            send_self(tx, error_event("Access denied to conversation"));
        }
    }
}

async fn handle_leave_conversation(
    state: &Arc<AppState>,
    connection: &Arc<Mutex<Connection>>,
    tx: &PusherChannel,
) {
    let mut conn = connection.lock().await;
    let Some(user_id) = conn.user_id().cloned() else {
        send_self(tx, error_event("Not authenticated"));
        return;
    };

    // 参加中でなければ黙って無視する
    let Ok(conversation_id) = conn.exit_conversation() else {
        return;
    };
    drop(conn);

    let targets = state
        .leave_conversation_usecase
        .execute(&user_id, &conversation_id)
        .await;
    let left = user_left_event(&user_id, &conversation_id);
    if let Err(e) = state
        .leave_conversation_usecase
        .broadcast_user_left(targets, &left.to_json())
        .await
    {
        tracing::warn!("Failed to broadcast user-left: {}", e);
    }

    tracing::info!(
        "User '{}' left conversation '{}'",
        user_id.as_str(),
        conversation_id.as_str()
    );
}

async fn handle_typing(
    state: &Arc<AppState>,
    connection: &Arc<Mutex<Connection>>,
    tx: &PusherChannel,
    is_typing: bool,
) {
    let conn = connection.lock().await;
    let Some(user_id) = conn.user_id().cloned() else {
        send_self(tx, error_event("Not authenticated"));
        return;
    };

    // 参加中でなければ黙って無視する
    let Some(conversation_id) = conn.current_conversation().cloned() else {
        return;
    };
    drop(conn);

    match state
        .set_typing_usecase
        .execute(&conversation_id, &user_id, is_typing)
        .await
    {
        Ok((record, targets)) => {
            let event = if record.is_typing {
                ServerEvent::TypingStart {
                    user_id: user_id.as_str().to_string(),
                    conversation_id: conversation_id.as_str().to_string(),
                    timestamp: now_rfc3339(),
                }
            } else {
                ServerEvent::TypingStop {
                    user_id: user_id.as_str().to_string(),
                    conversation_id: conversation_id.as_str().to_string(),
                    timestamp: now_rfc3339(),
                }
            };
            if let Err(e) = state
                .set_typing_usecase
                .broadcast_typing(targets, &event.to_json())
                .await
            {
                tracing::warn!("Failed to broadcast typing event: {}", e);
            }
        }
        Err(e) => {
            // ミラーへ書けなかった場合は配信しない（ログのみ、接続は維持）
            tracing::warn!(
                "Failed to persist typing state for user '{}' in conversation '{}': {}",
                user_id.as_str(),
                conversation_id.as_str(),
                e
            );
        }
    }
}

async fn handle_message_sent(
    state: &Arc<AppState>,
    connection: &Arc<Mutex<Connection>>,
    tx: &PusherChannel,
    conversation_id: String,
    message_id: Option<String>,
    message_data: serde_json::Value,
) {
    let conn = connection.lock().await;
    let Some(user_id) = conn.user_id().cloned() else {
        send_self(tx, error_event("Not authenticated"));
        return;
    };
    drop(conn);

    let conversation_id = match ConversationId::try_from(conversation_id) {
        Ok(conversation_id) => conversation_id,
        Err(e) => {
            tracing::warn!("Rejected message relay with invalid conversation id: {}", e);
            send_self(tx, error_event("Invalid conversation id"));
            return;
        }
    };
    let message_id = message_id.and_then(|id| MessageId::new(id).ok());

    // The message itself was already persisted by the external HTTP layer;
    // the hub only relays it to the other present participants
    let targets = state
        .notify_conversation_usecase
        .notify_new_message(&conversation_id, message_id, message_data, Some(&user_id))
        .await;

    tracing::info!(
        "Relayed message from '{}' to {} participant(s) in conversation '{}'",
        user_id.as_str(),
        targets.len(),
        conversation_id.as_str()
    );
}

async fn handle_message_read(
    state: &Arc<AppState>,
    connection: &Arc<Mutex<Connection>>,
    tx: &PusherChannel,
    conversation_id: String,
    message_id: Option<String>,
) {
    let conn = connection.lock().await;
    let Some(user_id) = conn.user_id().cloned() else {
        send_self(tx, error_event("Not authenticated"));
        return;
    };
    drop(conn);

    let conversation_id = match ConversationId::try_from(conversation_id) {
        Ok(conversation_id) => conversation_id,
        Err(e) => {
            tracing::warn!("Rejected read receipt with invalid conversation id: {}", e);
            send_self(tx, error_event("Invalid conversation id"));
            return;
        }
    };
    let message_id = message_id.and_then(|id| MessageId::new(id).ok());

    state
        .notify_conversation_usecase
        .notify_message_read(&conversation_id, message_id, &user_id)
        .await;
}

async fn handle_heartbeat(
    state: &Arc<AppState>,
    connection: &Arc<Mutex<Connection>>,
    tx: &PusherChannel,
) {
    let conn = connection.lock().await;
    let Some(user_id) = conn.user_id().cloned() else {
        send_self(tx, error_event("Not authenticated"));
        return;
    };
    drop(conn);

    state
        .registry
        .touch_heartbeat(&user_id, Timestamp::new(now_utc_millis()))
        .await;

    send_self(
        tx,
        ServerEvent::HeartbeatAck {
            timestamp: now_rfc3339(),
        },
    );
}

/// Leave-room / typing-stop / unregister cleanup, shared by every way a
/// connection can end (graceful close, transport error, replacement,
/// liveness eviction).
async fn run_disconnect_cleanup(state: &Arc<AppState>, connection: &Arc<Mutex<Connection>>) {
    let (connection_id, user_id, conversation_id) = {
        let conn = connection.lock().await;
        (
            conn.id().clone(),
            conn.user_id().cloned(),
            conn.current_conversation().cloned(),
        )
    };

    // 未認証のまま切断した接続には後始末するものがない
    let Some(user_id) = user_id else {
        return;
    };

    if let Some(conversation_id) = conversation_id {
        let targets = state
            .leave_conversation_usecase
            .execute(&user_id, &conversation_id)
            .await;
        let left = user_left_event(&user_id, &conversation_id);
        if let Err(e) = state
            .leave_conversation_usecase
            .broadcast_user_left(targets, &left.to_json())
            .await
        {
            tracing::warn!("Failed to broadcast user-left: {}", e);
        } else {
            tracing::info!(
                "Broadcasted user-left for '{}' in conversation '{}'",
                user_id.as_str(),
                conversation_id.as_str()
            );
        }
    }

    state
        .disconnect_usecase
        .execute(&user_id, &connection_id)
        .await;
}

/// Send an event back to this connection's own outbound channel.
///
/// If the pusher loop is already gone the connection is closing; drop the
/// event silently.
fn send_self(tx: &PusherChannel, event: ServerEvent) {
    let _ = tx.send(event.to_json());
}

fn error_event(message: &str) -> ServerEvent {
    ServerEvent::Error {
        message: message.to_string(),
        timestamp: now_rfc3339(),
    }
}

fn user_left_event(user_id: &UserId, conversation_id: &ConversationId) -> ServerEvent {
    ServerEvent::UserLeftConversation {
        user_id: user_id.as_str().to_string(),
        conversation_id: conversation_id.as_str().to_string(),
        timestamp: now_rfc3339(),
    }
}

fn now_rfc3339() -> String {
    timestamp_to_rfc3339(now_utc_millis())
}
