//! Test client for GraphQL subscriptions carried over the
//! [legacy `graphql-ws` GraphQL over WebSocket Protocol][old], as formerly used by [Apollo] and
//! the [`subscriptions-transport-ws` npm package].
//!
//! The entry point is [`GraphQLTestSubscription`]: it owns one WebSocket session, drives the
//! subscription lifecycle (`connection_init` → `connection_ack` → `start` → `data`/`error` →
//! `stop`/`complete`) and buffers asynchronously received responses so tests can assert on them
//! synchronously. Any contract violation fails the calling test immediately; there is no
//! recoverable-error path on the public surface.
//!
//! ```no_run
//! # use std::time::Duration;
//! # use graphql_ws_test_client::{GraphQLTestSubscription, SubscriptionConfig};
//! # async fn example() {
//! let config = SubscriptionConfig::new("localhost", 8080, "/subscriptions");
//! let mut subscription = GraphQLTestSubscription::new(config);
//! subscription
//!     .start("tests/queries/new_humans.graphql", None)
//!     .await;
//! let response = subscription
//!     .await_and_get_next_response(Duration::from_secs(5), true)
//!     .await;
//! assert_eq!(
//!     response.get_as::<String>("data.newHumans.name").as_deref(),
//!     Some("Luke Skywalker"),
//! );
//! # }
//! ```
//!
//! [`subscriptions-transport-ws` npm package]: https://npmjs.com/package/subscriptions-transport-ws
//! [Apollo]: https://www.apollographql.com
//! [old]: https://github.com/apollographql/subscriptions-transport-ws/blob/v0.11.0/PROTOCOL.md

mod client_message;
mod error;
mod handler;
mod response;
mod server_message;
mod state;
mod subscription;

pub use self::{
    client_message::{ClientMessage, StartPayload},
    error::Error,
    response::GraphQLResponse,
    server_message::ServerMessage,
    subscription::{GraphQLTestSubscription, SubscriptionConfig},
};
