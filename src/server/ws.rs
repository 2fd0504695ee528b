//! `WS /ws/{client_id}` progress subscription: the client connects once and
//! then sends `{"subscribe": {"job_id": "..."}}` or `{"subscribe": {"source_id": "..."}}`
//! text frames to attach/detach from topics, receiving `ProgressEvent` JSON
//! frames back.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppContext;
use crate::progress::Topic;

pub async fn upgrade(
    State(ctx): State<AppContext>,
    Path(client_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(ctx, client_id, socket))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClientMessage {
    Subscribe { job_id: Option<Uuid>, source_id: Option<Uuid> },
    Unsubscribe { job_id: Option<Uuid>, source_id: Option<Uuid> },
}

fn topic_of(job_id: Option<Uuid>, source_id: Option<Uuid>) -> Option<Topic> {
    match (job_id, source_id) {
        (Some(id), _) => Some(Topic::Job(id)),
        (None, Some(id)) => Some(Topic::Source(id)),
        (None, None) => None,
    }
}

async fn handle_socket(ctx: AppContext, client_id: String, mut socket: WebSocket) {
    let mut current: Option<Topic> = None;
    let mut stream: Option<tokio_stream::wrappers::ReceiverStream<crate::progress::ProgressEvent>> = None;

    loop {
        let next_event = async {
            match &mut stream {
                Some(s) => {
                    use tokio_stream::StreamExt;
                    s.next().await
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Subscribe { job_id, source_id }) => {
                                if let Some(old) = current.take() {
                                    ctx.progress.unsubscribe(&client_id, old);
                                }
                                if let Some(topic) = topic_of(job_id, source_id) {
                                    stream = Some(ctx.progress.subscribe(&client_id, topic));
                                    current = Some(topic);
                                }
                            }
                            Ok(ClientMessage::Unsubscribe { job_id, source_id }) => {
                                if let Some(topic) = topic_of(job_id, source_id) {
                                    ctx.progress.unsubscribe(&client_id, topic);
                                    if current == Some(topic) {
                                        current = None;
                                        stream = None;
                                    }
                                }
                            }
                            Err(e) => {
                                let _ = socket
                                    .send(Message::Text(format!("{{\"error\":\"invalid message: {e}\"}}")))
                                    .await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            event = next_event => {
                let Some(event) = event else { continue };
                let Ok(payload) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(topic) = current {
        ctx.progress.unsubscribe(&client_id, topic);
    }
}
