//! WebSocket relay.
//!
//! Each client connects with `?token=<token>`. Once both tokens of a pair
//! are connected, every text frame from one side is forwarded verbatim to
//! the other.

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::MatchError;
use crate::models::{ConnectionId, Token};
use crate::protocol::{Envelope, Outbound};
use crate::registry::SessionRegistry;

type WsSender = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsReceiver = SplitStream<WebSocketStream<TcpStream>>;

/// Accept relay connections forever.
pub async fn serve(listener: TcpListener, registry: Arc<SessionRegistry>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tracing::debug!(%addr, "relay connection accepted");
                let registry = Arc::clone(&registry);
                tokio::spawn(handle_connection(stream, registry));
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to accept relay connection");
            }
        }
    }
}

/// Pull the `token` parameter out of a request query string.
fn token_param(query: &str) -> Option<&str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value)
}

/// Handle a single relay connection.
async fn handle_connection(stream: TcpStream, registry: Arc<SessionRegistry>) {
    let mut query = None;
    let capture_query = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        query = request.uri().query().map(str::to_string);
        Ok(response)
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, capture_query).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(error = %e, "websocket handshake failed");
            return;
        }
    };

    let conn = ConnectionId::new();
    let (ws_sender, ws_receiver) = ws_stream.split();
    let (tx, rx) = mpsc::unbounded_channel::<Outbound>();
    let mut send_task = tokio::spawn(write_outbound(ws_sender, rx));

    let token = query
        .as_deref()
        .and_then(token_param)
        .ok_or(MatchError::InvalidToken)
        .and_then(str::parse::<Token>);

    let attached = match token {
        Ok(token) => match registry.attach(token, conn, tx.clone()).await {
            Ok(outcome) => {
                tracing::info!(%conn, %token, ?outcome, "relay connection attached");
                true
            }
            Err(e) => {
                tracing::warn!(%conn, %token, error = %e, "relay connection rejected");
                reject(&tx, &e);
                false
            }
        },
        Err(e) => {
            tracing::warn!(%conn, "relay connection without a usable token");
            reject(&tx, &e);
            false
        }
    };

    let mut writer_done = false;
    if attached {
        let end = read_inbound(conn, ws_receiver, &registry, &mut send_task).await;
        // Tear down before answering so the client never sees its own
        // rejection ahead of the registry cleanup.
        registry.disconnect_eventually(conn).await;
        match end {
            ReadEnd::WriterClosed => writer_done = true,
            ReadEnd::ClientLeft => {}
            ReadEnd::Rejected(e) => {
                tracing::warn!(%conn, error = %e, "dropping relay connection");
                reject(&tx, &e);
            }
        }
        tracing::info!(%conn, "relay connection closed");
    }

    drop(tx);
    if !writer_done {
        let _ = send_task.await;
    }
}

/// Tell a client why it is being dropped and close it.
fn reject(tx: &mpsc::UnboundedSender<Outbound>, error: &MatchError) {
    let _ = tx.send(Envelope::error(format!("{error}. Connection will be closed.")).into());
    let _ = tx.send(Outbound::Close);
}

/// Why a connection's read loop stopped.
enum ReadEnd {
    /// The writer already closed the socket.
    WriterClosed,
    /// The client closed or the socket failed.
    ClientLeft,
    /// The client broke protocol.
    Rejected(MatchError),
}

/// Process frames from the client until it leaves, misbehaves, or the
/// writer closes the connection.
async fn read_inbound(
    conn: ConnectionId,
    mut ws_receiver: WsReceiver,
    registry: &SessionRegistry,
    send_task: &mut tokio::task::JoinHandle<()>,
) -> ReadEnd {
    loop {
        let frame = tokio::select! {
            frame = ws_receiver.next() => frame,
            _ = &mut *send_task => return ReadEnd::WriterClosed,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text.to_string(),
            Some(Ok(Message::Binary(_))) => {
                return ReadEnd::Rejected(MatchError::MalformedPayload(
                    "binary frames are not supported".into(),
                ));
            }
            Some(Ok(Message::Close(_))) | None => return ReadEnd::ClientLeft,
            Some(Err(e)) => {
                tracing::debug!(%conn, error = %e, "relay read failed");
                return ReadEnd::ClientLeft;
            }
            Some(Ok(_)) => continue,
        };

        if let Err(e) = relay_text(conn, text, registry).await {
            return ReadEnd::Rejected(e);
        }
    }
}

/// Validate one text frame and forward it to the peer.
async fn relay_text(
    conn: ConnectionId,
    text: String,
    registry: &SessionRegistry,
) -> Result<(), MatchError> {
    serde_json::from_str::<serde_json::Value>(&text)?;
    registry.forward(conn, text).await
}

/// Drain a connection's outbox into its socket.
async fn write_outbound(mut ws_sender: WsSender, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(out) = rx.recv().await {
        let frame = match out {
            Outbound::Envelope(envelope) => Message::Text(envelope.to_json().into()),
            Outbound::Payload(payload) => Message::Text(payload.into()),
            Outbound::Close => break,
        };
        if ws_sender.send(frame).await.is_err() {
            return;
        }
    }
    let _ = ws_sender.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_param() {
        assert_eq!(token_param("token=abc"), Some("abc"));
        assert_eq!(token_param("x=1&token=abc&y=2"), Some("abc"));
        assert_eq!(token_param("x=1"), None);
        assert_eq!(token_param(""), None);
    }
}
