//! WebSocket upgrade handler for live booking notifications.
//!
//! Connection lifecycle:
//! 1. Upgrade to WebSocket (always accepted, so rejections can be explained)
//! 2. Verify the `token` query parameter
//! 3. Join the audience groups the caller's roles allow
//! 4. Forward group frames and answer pings until disconnect
//! 5. Leave every group

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::{self, BoxStream, SplitSink};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};

use crate::domain::audience::AudienceGroup;
use crate::domain::foundation::{AuthError, Identity, Timestamp};
use crate::ports::TokenVerifier;

use super::{
    messages::{ClientMessage, Frame, ServerMessage},
    rooms::{AudienceRegistry, ClientId},
};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<AudienceRegistry>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl GatewayState {
    pub fn new(registry: Arc<AudienceRegistry>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { registry, verifier }
    }
}

/// Query parameters of the live endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct LiveParams {
    pub token: Option<String>,
}

/// Handle WebSocket upgrade requests for live booking notifications.
///
/// Route: `GET /bookings/live?token=...`
pub async fn live_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<LiveParams>,
    State(state): State<GatewayState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params.token, state))
}

/// Checks the connection token. The token is trimmed first; a missing or
/// blank token is `TokenRequired`, anything else that fails is `InvalidToken`.
pub fn authenticate(verifier: &dyn TokenVerifier, token: Option<&str>) -> Result<Identity, AuthError> {
    let token = token.map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return Err(AuthError::TokenRequired);
    }
    verifier.verify(token).map_err(|e| match e {
        AuthError::TokenRequired => AuthError::TokenRequired,
        _ => AuthError::InvalidToken,
    })
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, token: Option<String>, state: GatewayState) {
    let (mut sender, mut receiver) = socket.split();
    let client_id = ClientId::new();

    let identity = match authenticate(state.verifier.as_ref(), token.as_deref()) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::info!(client_id = %client_id, error = %e, "Rejecting live connection");
            if let Err(e) = send_message(&mut sender, &ServerMessage::rejected(&e)).await {
                tracing::debug!(client_id = %client_id, "Failed to send rejection: {}", e);
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let groups = AudienceGroup::for_identity(&identity);
    let mut group_streams: Vec<BoxStream<'static, Frame>> = Vec::with_capacity(groups.len() + 1);
    for group in &groups {
        let rx = state.registry.join(*group, client_id.clone()).await;
        group_streams.push(frames(rx, client_id.clone()).boxed());
    }
    tracing::info!(
        client_id = %client_id,
        user_id = %identity.subject,
        groups = groups.len(),
        "Live connection authenticated"
    );

    if let Err(e) = send_message(&mut sender, &ServerMessage::authenticated()).await {
        tracing::debug!(client_id = %client_id, "Failed to send connection_success: {}", e);
        state.registry.leave_all(&client_id).await;
        return;
    }

    // Replies to this client only (pongs) share the outbound stream.
    let (direct_tx, direct_rx) = mpsc::channel::<Frame>(16);
    group_streams.push(
        stream::unfold(direct_rx, |mut rx| async move { rx.recv().await.map(|f| (f, rx)) }).boxed(),
    );
    let mut outbound = stream::select_all(group_streams);

    let mut send_task = {
        let client_id = client_id.clone();
        tokio::spawn(async move {
            while let Some(frame) = outbound.next().await {
                if let Err(e) = sender.send(Message::Text(frame.to_string())).await {
                    tracing::debug!(client_id = %client_id, "Send error, closing connection: {}", e);
                    break;
                }
            }
        })
    };

    let mut recv_task = {
        let client_id = client_id.clone();
        tokio::spawn(async move {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Ping) => {
                            let pong = ServerMessage::Pong {
                                timestamp: Timestamp::now().as_unix_millis(),
                            };
                            match pong.to_frame() {
                                Ok(frame) => {
                                    if direct_tx.send(frame).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => tracing::warn!(error = %e, "Failed to encode pong"),
                            }
                        }
                        Err(_) => {
                            tracing::debug!(client_id = %client_id, "Ignoring unrecognised client message");
                        }
                    },
                    Ok(Message::Binary(_)) => {
                        tracing::warn!(client_id = %client_id, "Received unsupported binary message");
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                        // Protocol-level keepalives are answered by axum
                    }
                    Ok(Message::Close(_)) => {
                        tracing::debug!(client_id = %client_id, "Client sent close frame");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(client_id = %client_id, "Receive error: {}", e);
                        break;
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let left = state.registry.leave_all(&client_id).await;
    tracing::info!(client_id = %client_id, groups = left.len(), "Live connection closed");
}

/// Frames from one group. A lagging receiver skips what it missed.
fn frames(rx: broadcast::Receiver<Frame>, client_id: ClientId) -> impl futures::Stream<Item = Frame> {
    stream::unfold((rx, client_id), |(mut rx, client_id)| async move {
        loop {
            match rx.recv().await {
                Ok(frame) => return Some((frame, (rx, client_id))),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(client_id = %client_id, skipped, "Live connection lagging, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// Send a JSON message over the WebSocket.
async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let frame = msg.to_frame().map_err(axum::Error::new)?;
    sender.send(Message::Text(frame.to_string())).await
}

/// Create axum router for the live endpoint.
pub fn gateway_router() -> axum::Router<GatewayState> {
    use axum::routing::get;

    axum::Router::new().route("/bookings/live", get(live_handler))
}
