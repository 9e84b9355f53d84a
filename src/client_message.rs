use serde::Serialize;
use serde_json::Value;

/// The payload for the client's "start" message. This triggers execution of a subscription
/// operation on the server.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    /// The document body.
    pub query: String,

    /// The variables the document is evaluated with. Sent as an empty object when the operation
    /// needs none.
    pub variables: Value,
}

/// ClientMessage defines the message types that this client sends.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// ConnectionInit is sent upon connecting, before anything else. The payload is often used
    /// for authentication.
    ConnectionInit {
        /// Optional parameters of any shape. Sent as an empty object when none are needed.
        payload: Value,
    },
    /// Start messages are used to execute a GraphQL operation.
    Start {
        /// The id of the operation. Unique per subscription attempt within the test process.
        id: u64,

        /// The query and variables.
        payload: StartPayload,
    },
    /// Stop messages are used to unsubscribe from a subscription.
    Stop {
        /// The id of the operation to stop.
        id: u64,
    },
}
