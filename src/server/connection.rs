//! Per-connection WebSocket task
//!
//! Upgrades the socket, feeds decoded envelopes to a [`SignalingRouter`],
//! and drains the connection's outbound queue into the socket from a
//! separate writer task.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use crate::error::{Error, Result};
use crate::protocol::Envelope;
use crate::registry::{ConnectionId, RoomRegistry};
use crate::server::config::ServerConfig;
use crate::session::{ConnectionContext, ConnectionHub, SignalingRouter};

type WsStream = WebSocketStream<TcpStream>;

/// One accepted peer connection
pub struct Connection {
    ctx: ConnectionContext,
    socket: TcpStream,
    config: ServerConfig,
    registry: Arc<RoomRegistry>,
    hub: Arc<ConnectionHub>,
}

impl Connection {
    /// Create a connection for an accepted socket
    pub fn new(
        connection_id: ConnectionId,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        registry: Arc<RoomRegistry>,
        hub: Arc<ConnectionHub>,
    ) -> Self {
        Self {
            ctx: ConnectionContext::new(connection_id, peer_addr),
            socket,
            config,
            registry,
            hub,
        }
    }

    /// Run the connection until the peer goes away
    ///
    /// Room cleanup runs on every exit path after the upgrade succeeded.
    pub async fn run(self) -> Result<()> {
        let Connection {
            mut ctx,
            socket,
            config,
            registry,
            hub,
        } = self;
        let id = ctx.connection_id;

        let ws = accept(socket, &config).await?;
        let (mut sink, mut stream) = ws.split();

        let mut outbound = hub.register(id);
        let writer = tokio::spawn(async move {
            while let Some(envelope) = outbound.recv().await {
                let text = match envelope.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(connection = %id, error = %e, "Failed to encode envelope");
                        continue;
                    }
                };

                if let Err(e) = sink.send(Message::text(text)).await {
                    tracing::debug!(connection = %id, error = %e, "Write failed");
                    break;
                }
            }

            let _ = sink.close().await;
        });

        tracing::info!(connection = %id, peer = %ctx.peer_addr, "Peer connected");

        let mut router = SignalingRouter::new(id, registry, Arc::clone(&hub));
        let result = read_loop(&mut ctx, &mut stream, &mut router).await;

        router.disconnect().await;

        // Dropping the queue lets the writer flush and close the socket
        hub.unregister(id);
        if tokio::time::timeout(config.handshake_timeout, writer)
            .await
            .is_err()
        {
            tracing::debug!(connection = %id, "Writer did not finish in time");
        }

        tracing::info!(
            connection = %id,
            peer = %ctx.peer_addr,
            duration_ms = ctx.duration().as_millis() as u64,
            received = ctx.messages_received,
            rejected = ctx.messages_rejected,
            "Peer disconnected"
        );

        result
    }
}

/// Perform the WebSocket upgrade on the configured path
async fn accept(socket: TcpStream, config: &ServerConfig) -> Result<WsStream> {
    let path = config.path.clone();
    let check_path =
        move |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
            if req.uri().path() == path {
                Ok(resp)
            } else {
                let mut err = ErrorResponse::new(Some("Not Found".to_string()));
                *err.status_mut() = StatusCode::NOT_FOUND;
                Err(err)
            }
        };

    match tokio::time::timeout(config.handshake_timeout, accept_hdr_async(socket, check_path)).await
    {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::HandshakeTimeout),
    }
}

async fn read_loop(
    ctx: &mut ConnectionContext,
    stream: &mut SplitStream<WsStream>,
    router: &mut SignalingRouter<Arc<ConnectionHub>>,
) -> Result<()> {
    let id = ctx.connection_id;

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
            Err(e) => return Err(e.into()),
        };

        match frame {
            Message::Text(text) => {
                ctx.messages_received += 1;

                let envelope = match Envelope::from_json(text.as_str()) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        ctx.messages_rejected += 1;
                        tracing::warn!(connection = %id, error = %e, "Undecodable envelope dropped");
                        continue;
                    }
                };

                let kind = envelope.kind.clone();
                tracing::debug!(connection = %id, kind = %kind, "Envelope received");

                if let Err(e) = router.handle(envelope).await {
                    ctx.messages_rejected += 1;
                    if e.is_benign() {
                        tracing::debug!(connection = %id, kind = %kind, error = %e, "Envelope ignored");
                    } else {
                        tracing::warn!(connection = %id, kind = %kind, error = %e, "Envelope dropped");
                    }
                }
            }
            Message::Binary(_) => {
                tracing::debug!(connection = %id, "Binary frame ignored");
            }
            Message::Close(_) => break,
            // Ping/pong are answered by tungstenite
            _ => {}
        }
    }

    Ok(())
}
