use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use horizon_store::{MessageStore, StoreError};
use horizon_types::events::ClientEvent;

use crate::dispatcher::Dispatcher;
use crate::router::{self, Mutation};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle one WebSocket connection for its whole lifetime.
///
/// The transport handshake already completed at the HTTP upgrade layer, so
/// the connection starts in the Connected state; it becomes Joined when the
/// client announces a username, and Disconnected when either task exits.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, store: Arc<MessageStore>) {
    let (mut sender, mut receiver) = socket.split();

    let conn_id = dispatcher.register().await;
    info!(%conn_id, "client connected");

    let mut broadcast_rx = dispatcher.subscribe();
    let dispatcher_recv = dispatcher.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcast frames to this client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let frame = match result {
                        Ok(frame) => frame,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(%conn_id, skipped = n, "broadcast receiver lagged");
                            continue;
                        }
                        Err(_) => break,
                    };

                    if !frame.delivers_to(conn_id) {
                        continue;
                    }

                    let text = serde_json::to_string(&frame.event).unwrap();
                    if sender.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!(%conn_id, missed = missed_heartbeats, "heartbeat timeout, dropping connection");
                            break;
                        }
                    }
                    if sender.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read events from the client
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                WsMessage::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        handle_event(&dispatcher_recv, &store, conn_id, event).await;
                    }
                    Err(e) => {
                        let raw: String = text.chars().take(200).collect();
                        warn!(%conn_id, error = %e, raw, "bad client frame");
                    }
                },
                WsMessage::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Leaving is silent: the protocol has no user:left event, only the join
    // announcement on the way in.
    match dispatcher.unregister(conn_id).await {
        Some(username) => info!(%conn_id, username, "client disconnected"),
        None => info!(%conn_id, "client disconnected before joining"),
    }
}

/// Apply one inbound event: mutate the store, and on success hand the result
/// to the router for fan-out. Mutations carry their own self-reported
/// username, so they are honored whether or not this connection ever joined.
async fn handle_event(
    dispatcher: &Dispatcher,
    store: &MessageStore,
    conn_id: Uuid,
    event: ClientEvent,
) {
    let _serialized = dispatcher.event_guard().await;

    match event {
        ClientEvent::Join { username } => {
            if username.trim().is_empty() {
                warn!(%conn_id, "join with empty username ignored");
                return;
            }
            dispatcher.bind_username(conn_id, &username).await;
            info!(%conn_id, username, "user joined");
            dispatcher.dispatch(router::route(
                conn_id,
                Mutation::Joined { username, timestamp: Utc::now() },
            ));
        }

        ClientEvent::Message { id, username, text, .. } => {
            match store.create_message(&id, &username, &text) {
                Ok(message) => {
                    dispatcher.dispatch(router::route(conn_id, Mutation::Created(message)));
                }
                Err(err) => reject(store, conn_id, "chat:message", err),
            }
        }

        ClientEvent::Reaction { message_id, emoji, username } => {
            match store.toggle_reaction(&message_id, &emoji, &username) {
                Ok(reactions) => {
                    dispatcher.dispatch(router::route(
                        conn_id,
                        Mutation::Reacted { message_id, reactions },
                    ));
                }
                Err(err) => reject(store, conn_id, "message:reaction", err),
            }
        }

        ClientEvent::Edit { message_id, new_text, username } => {
            match store.edit_message(&message_id, &new_text, &username) {
                Ok(message) => {
                    // broadcast the stored text, not the raw payload
                    dispatcher.dispatch(router::route(
                        conn_id,
                        Mutation::Edited { message_id, new_text: message.text },
                    ));
                }
                Err(err) => reject(store, conn_id, "message:edit", err),
            }
        }

        ClientEvent::Delete { message_id, username } => {
            match store.delete_message(&message_id, &username) {
                Ok(()) => {
                    dispatcher.dispatch(router::route(conn_id, Mutation::Deleted { message_id }));
                }
                Err(err) => reject(store, conn_id, "message:delete", err),
            }
        }
    }
}

/// Rejected mutations are logged and counted, never answered: the offending
/// client gets no error event, matching the wire protocol.
fn reject(store: &MessageStore, conn_id: Uuid, event: &'static str, err: StoreError) {
    warn!(
        %conn_id,
        event,
        error = %err,
        rejected_total = store.rejection_counts().total(),
        "mutation rejected"
    );
}
