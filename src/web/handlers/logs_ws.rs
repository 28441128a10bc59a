use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::StreamExt;
use tracing::debug;

use crate::docker::DockerManager;
use crate::web::error::AppError;
use crate::web::middleware::auth::decode_token;
use crate::web::models::WsAuthQuery;
use crate::web::AppState;

/// Live log tail over a WebSocket, one text frame per line. Browsers cannot
/// set headers on WebSocket requests, so the JWT rides in the query string
/// and is checked before the upgrade.
pub async fn logs_ws_handler(
    State(state): State<Arc<AppState>>,
    Path(container_id): Path<String>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let user = decode_token(&query.token, &state.config.jwt_secret)?;
    let docker = state.docker()?.clone();
    debug!(container_id = %container_id, user = %user.username, "Starting log stream.");
    Ok(ws.on_upgrade(move |socket| stream_logs(socket, docker, container_id)))
}

async fn stream_logs(mut socket: WebSocket, docker: Arc<DockerManager>, container_id: String) {
    let mut lines = docker.stream_logs(&container_id);
    loop {
        tokio::select! {
            line = lines.next() => {
                match line {
                    Some(Ok(line)) => {
                        if socket.send(Message::Text(line.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = socket
                            .send(Message::Text(format!("log stream error: {e}").into()))
                            .await;
                        break;
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                // Any close (or socket error) from the client ends the tail.
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }
    debug!(container_id = %container_id, "Log stream closed.");
}
