use crate::error::Result;
use crate::params::connect::ConnectParams;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use log::*;
use realtime::{Lifecycle, Session};
use service::AppState;
use tokio::sync::mpsc;

/// WebSocket handler for live notifications.
///
/// The bearer token is validated before the upgrade; a refused connection gets a
/// plain 401 and never reaches the socket. Accepted connections are served by
/// their own task until the client disconnects.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(app_state): State<AppState>,
) -> Result<Response> {
    let session = authenticate(&app_state, &params).await?;
    let lifecycle = app_state.lifecycle.clone();
    let capacity = app_state.config.outbound_queue_capacity as usize;

    Ok(ws.on_upgrade(move |socket| serve_socket(socket, session, lifecycle, capacity)))
}

/// `Connecting -> Authenticating`, or an error the handler turns into a refusal.
pub(crate) async fn authenticate(app_state: &AppState, params: &ConnectParams) -> Result<Session> {
    let lifecycle = &app_state.lifecycle;
    let mut session = lifecycle.connect();
    lifecycle
        .authenticate(&mut session, params.token.as_deref())
        .await?;
    Ok(session)
}

async fn serve_socket(
    mut socket: WebSocket,
    mut session: Session,
    lifecycle: Lifecycle,
    capacity: usize,
) {
    let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));

    let connection_id = match lifecycle.join(&mut session, tx) {
        Ok(connection_id) => connection_id,
        Err(e) => {
            warn!("Closing socket that failed to join: {e}");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    // Frames queued by the dispatcher are written here, in order.
    let mut writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(payload)).await {
                debug!("Write failed, stopping writer: {e}");
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = lifecycle.receive(&session, &text) {
                        warn!("Dropping inbound frame on {connection_id}: {e}");
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Socket error on {connection_id}: {e}");
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    debug!("Connection {connection_id} closed, cleaning up");
    lifecycle.close(&mut session);
    writer.abort();
}
