use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parlor_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::{Dispatcher, Subscriptions};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serves one realtime connection until either side hangs up.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    let ready = GatewayEvent::Ready { connection_id };
    let Ok(text) = serde_json::to_string(&ready) else {
        return;
    };
    if sender.send(Message::Text(text.into())).await.is_err() {
        return;
    }

    let open = dispatcher.connection_opened();
    info!("Realtime connection {} opened ({} open)", connection_id, open);

    let mut broadcast_rx = dispatcher.subscribe();
    let subscriptions = Subscriptions::default();
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward subscribed room events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(RecvError::Lagged(n)) => {
                            // Clients fall back to polling for anything skipped here.
                            warn!("Realtime connection {} lagged by {} events", connection_id, n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if !send_subscriptions.accepts(&event) {
                        continue;
                    }

                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection {}", missed_heartbeats, connection_id);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => apply_command(connection_id, cmd, &subscriptions),
                    Err(e) => {
                        warn!(
                            "Realtime connection {} bad command: {} -- raw: {}",
                            connection_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let open = dispatcher.connection_closed();
    info!("Realtime connection {} closed ({} open)", connection_id, open);
}

fn apply_command(connection_id: Uuid, cmd: GatewayCommand, subscriptions: &Subscriptions) {
    match cmd {
        GatewayCommand::Subscribe { chat_room_ids } => {
            subscriptions.add(&chat_room_ids);
            debug!(
                "Realtime connection {} subscribed to {} rooms (now {})",
                connection_id,
                chat_room_ids.len(),
                subscriptions.len()
            );
        }
        GatewayCommand::Unsubscribe { chat_room_ids } => {
            subscriptions.remove(&chat_room_ids);
            debug!(
                "Realtime connection {} unsubscribed from {} rooms (now {})",
                connection_id,
                chat_room_ids.len(),
                subscriptions.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_update_subscriptions() {
        let subs = Subscriptions::default();
        let room = Uuid::new_v4();

        apply_command(Uuid::nil(), GatewayCommand::Subscribe { chat_room_ids: vec![room] }, &subs);
        assert_eq!(subs.len(), 1);

        apply_command(Uuid::nil(), GatewayCommand::Unsubscribe { chat_room_ids: vec![room] }, &subs);
        assert!(subs.is_empty());
    }
}
