//! Relay WebSocket transport
//!
//! Text frames are decoded into session events; outbound messages are written
//! by a dedicated sender task so a slow socket never blocks event handling.

use super::AppState;
use crate::relay::{Event, InboundMessage, OutboundMessage, RelaySession};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

const CHANNEL_BUFFER_SIZE: usize = 64;

pub async fn relay_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let connection_id = Uuid::new_v4();
    tracing::info!(%connection_id, "Relay WebSocket upgrade requested");

    ws.on_upgrade(move |socket| {
        let span = tracing::info_span!(
            "relay",
            %connection_id,
            call_id = tracing::field::Empty
        );
        handle_socket(socket, state).instrument(span)
    })
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    tracing::info!("Relay WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundMessage>(CHANNEL_BUFFER_SIZE);
    let (event_tx, event_rx) = mpsc::channel::<Event>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let sender_task = tokio::spawn(
        async move {
            while let Some(message) = outbound_rx.recv().await {
                let json = match message.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize outgoing message");
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(json)).await {
                    tracing::warn!(error = %e, "Failed to send WebSocket message");
                    break;
                }
            }
        }
        .in_current_span(),
    );

    let session = RelaySession::new(
        state.store.clone(),
        state.llm.clone(),
        state.session,
        outbound_tx,
    )
    .with_fragment_timeout(state.fragment_timeout);
    let session_task = tokio::spawn(session.run(event_rx).in_current_span());

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match InboundMessage::decode(&text) {
                Ok(message) => {
                    if event_tx.send(message.into_event()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, bytes = text.len(), "Dropping malformed message");
                }
            },
            Ok(Message::Binary(data)) => {
                tracing::debug!(bytes = data.len(), "Ignoring binary frame");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                tracing::info!("Relay WebSocket close received");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Relay WebSocket error");
                break;
            }
        }
    }

    // A closed event channel is the session's Close
    drop(event_tx);
    if let Err(e) = session_task.await {
        tracing::error!(error = %e, "Relay session task failed");
    }
    sender_task.abort();

    tracing::info!("Relay WebSocket connection terminated");
}
