use serde::Deserialize;
use serde_json::Value;

/// ServerMessage defines the message types that servers can send.
///
/// Payloads and ids are kept as raw JSON trees: the handler asserts payload presence itself so
/// that a violation fails the test with a descriptive message, and never dispatches on the id
/// (there is only one in-flight operation per connection).
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// ConnectionError is used for errors that are not associated with a GraphQL operation. For
    /// example, this will be used when the server is unable to parse a client's message or the
    /// client's initialization parameters are rejected.
    ConnectionError {
        /// The error that occurred.
        #[serde(default)]
        payload: Option<Value>,
    },
    /// ConnectionAck is sent in response to a client's ConnectionInit message if the server
    /// accepted the connection.
    ConnectionAck,
    /// Data contains the result of a subscription event.
    Data {
        /// The id of the operation that the data is for.
        #[serde(default)]
        id: Option<Value>,

        /// The execution result.
        #[serde(default)]
        payload: Option<Value>,
    },
    /// Error contains an error that occurs before execution, such as validation errors.
    Error {
        /// The id of the operation that triggered this error.
        #[serde(default)]
        id: Option<Value>,

        /// The error(s).
        #[serde(default)]
        payload: Option<Value>,
    },
    /// Complete indicates that no more data will be sent for the given operation.
    Complete {
        /// The id of the operation that has completed.
        #[serde(default)]
        id: Option<Value>,
    },
    /// ConnectionKeepAlive is sent periodically by some servers after accepting a connection.
    #[serde(rename = "ka")]
    ConnectionKeepAlive,
    /// Any message type this client does not know. Ignored for forward compatibility.
    #[serde(other)]
    Unknown,
}
