//! Scripted `graphql-ws` server the integration tests run the client against.

use std::time::Duration;

use anyhow::{Context as _, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{Request, Response},
        http::header,
    },
};

/// One scripted reaction to a client's `start` message, sent in order.
#[derive(Clone, Debug)]
pub enum Frame {
    /// A JSON frame, sent verbatim.
    Json(Value),
    /// A raw text frame, for exercising misbehaving servers.
    Raw(String),
    /// A `data` frame echoing back the payload of the received `start` message.
    EchoStart,
    /// A pause before the next frame.
    Delay(Duration),
}

#[derive(Clone, Debug)]
struct Behavior {
    acknowledge: bool,
    on_start: Vec<Frame>,
}

/// A `graphql-ws` server bound to an ephemeral local port, answering `connection_init` with
/// `connection_ack` and `start` with a fixed script of frames. Connections are served one after
/// another with the same script, so a client may reconnect after a `reset`.
pub struct MockGraphQLServer {
    port: u16,
}

impl MockGraphQLServer {
    pub async fn start(on_start: Vec<Frame>) -> Result<Self> {
        Self::start_with(Behavior {
            acknowledge: true,
            on_start,
        })
        .await
    }

    /// A server that never acknowledges the connection, for timeout tests.
    pub async fn start_without_ack() -> Result<Self> {
        Self::start_with(Behavior {
            acknowledge: false,
            on_start: vec![],
        })
        .await
    }

    async fn start_with(behavior: Behavior) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let _ = serve_connection(stream, behavior.clone()).await;
            }
        });
        Ok(Self { port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

async fn serve_connection(stream: TcpStream, behavior: Behavior) -> Result<()> {
    let mut socket = accept_hdr_async(stream, |request: &Request, mut response: Response| {
        // Echo the sub-protocol the client asked for, as a well-behaved server would.
        if let Some(protocol) = request.headers().get(header::SEC_WEBSOCKET_PROTOCOL) {
            response
                .headers_mut()
                .insert(header::SEC_WEBSOCKET_PROTOCOL, protocol.clone());
        }
        Ok(response)
    })
    .await?;

    while let Some(message) = socket.next().await {
        let Message::Text(frame) = message? else {
            continue;
        };
        let envelope: Value =
            serde_json::from_str(frame.as_str()).context("client sent invalid JSON")?;
        match envelope["type"].as_str() {
            Some("connection_init") if behavior.acknowledge => {
                send_json(&mut socket, &json!({"type": "connection_ack"})).await?;
            }
            Some("start") => {
                for frame in &behavior.on_start {
                    match frame {
                        Frame::Json(value) => send_json(&mut socket, value).await?,
                        Frame::Raw(text) => socket.send(Message::text(text.clone())).await?,
                        Frame::EchoStart => {
                            let reply = json!({
                                "type": "data",
                                "id": envelope["id"],
                                "payload": {"data": {"echo": envelope["payload"]}},
                            });
                            send_json(&mut socket, &reply).await?;
                        }
                        Frame::Delay(duration) => tokio::time::sleep(*duration).await,
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

async fn send_json(
    socket: &mut tokio_tungstenite::WebSocketStream<TcpStream>,
    value: &Value,
) -> Result<()> {
    socket.send(Message::text(value.to_string())).await?;
    Ok(())
}
