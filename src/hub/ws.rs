use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::hub::actor::HubHandle;
use crate::hub::admission::Admission;
use crate::hub::envelope::{ClientEvent, ServerEvent};
use crate::hub::registry::ConnectionId;

#[debug_handler(state = crate::AppState)]
pub async fn chat_ws(State(hub): State<HubHandle>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |stream| handle_socket(hub, stream))
}

/// One connection's lifecycle: Open until the first accepted join, Joined
/// until the socket ends, Closed is falling out of this function. The room
/// and name are fixed at join time; later joins are ignored.
async fn handle_socket(hub: HubHandle, stream: WebSocket) {
    let conn = ConnectionId::new();
    let (mut sink, mut source) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Outbound half: drain hub events into the socket so a slow peer stalls
    // only its own forwarder, never the hub.
    let forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut joined = false;
    while let Some(Ok(msg)) = source.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let event = match serde_json::from_str::<ClientEvent>(&text) {
            Ok(event) => event,
            Err(err) => {
                warn!(%conn, %err, "unparseable envelope, dropping");
                continue;
            }
        };
        match event {
            ClientEvent::Join { display_name, role, room_id } if !joined => {
                match hub.join(conn, tx.clone(), display_name.clone(), role, room_id).await {
                    Ok(Admission::Accepted) => joined = true,
                    Ok(Admission::Rejected { reason }) => {
                        let _ = tx.send(ServerEvent::JoinRejected { display_name, reason });
                        break;
                    }
                    Err(err) => {
                        warn!(%conn, %err, "join failed");
                        break;
                    }
                }
            }
            ClientEvent::Join { .. } => debug!(%conn, "join while joined, ignoring"),
            ClientEvent::Message { text } if joined => hub.message(conn, text),
            ClientEvent::Message { .. } => debug!(%conn, "message before join, dropping"),
        }
    }

    if joined {
        hub.leave(conn);
    }
    // Let the forwarder flush what is already queued (a join_rejected, the
    // tail of a broadcast) before the sink drops.
    drop(tx);
    let _ = forward.await;
}
