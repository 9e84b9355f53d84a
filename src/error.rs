use derive_more::{Display, Error, From};

/// Errors that can happen while driving a test subscription.
///
/// These are internal to the DSL: every public operation converts them into an immediate test
/// failure rather than returning them to the caller.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Errors that can happen in the WebSocket transport while connecting, sending or closing.
    #[display("`tungstenite` error: {_0}")]
    #[from]
    Websocket(tokio_tungstenite::tungstenite::Error),

    /// Errors that can happen while serializing outgoing messages or deserializing incoming
    /// ones. A server response that is not a valid `graphql-ws` message is a test failure, not
    /// something to be silently skipped.
    #[display("`serde` error: {_0}")]
    #[from]
    Serde(serde_json::Error),

    /// An inbound `data` or `error` message carried no payload.
    #[display("`data`/`error` message without a payload")]
    MissingPayload,

    /// An operation that requires an open WebSocket session was attempted without one.
    #[display("WebSocket session is not open")]
    NotConnected,
}
