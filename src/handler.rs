use std::sync::Mutex;

use log::debug;

use crate::{
    error::Error, response::GraphQLResponse, server_message::ServerMessage,
    state::SubscriptionState,
};

/// Handles one inbound text frame. Runs on the transport's reader task, concurrently with the
/// caller's task.
///
/// A frame that is not a valid `graphql-ws` server message, or a `data`/`error` message without
/// a payload, is an error: the reader task records it on the state and the driver re-raises it
/// as a test failure on the caller's task.
pub(crate) fn handle_frame(state: &Mutex<SubscriptionState>, frame: &str) -> Result<(), Error> {
    debug!("received frame: {frame}");
    let message: ServerMessage = serde_json::from_str(frame)?;
    match message {
        ServerMessage::ConnectionAck => {
            lock(state).mark_acknowledged();
            debug!("connection acknowledged by the GraphQL server");
        }
        ServerMessage::Complete { .. } => {
            lock(state).mark_completed();
            debug!("subscription completed");
        }
        ServerMessage::Data { payload, .. } | ServerMessage::Error { payload, .. } => {
            let payload = payload
                .filter(|payload| !payload.is_null())
                .ok_or(Error::MissingPayload)?;
            let response = GraphQLResponse::new(payload);
            let mut state = lock(state);
            if state.is_stopped() || state.is_completed() {
                // Late frame from a closing socket; it must not corrupt the result set.
                debug!("response discarded, subscription already stopped or completed");
            } else {
                state.push_response(response);
                debug!("new response recorded");
            }
        }
        ServerMessage::ConnectionError { .. }
        | ServerMessage::ConnectionKeepAlive
        | ServerMessage::Unknown => {}
    }
    Ok(())
}

pub(crate) fn lock(state: &Mutex<SubscriptionState>) -> std::sync::MutexGuard<'_, SubscriptionState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
