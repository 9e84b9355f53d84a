use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::debug;
use serde_json::{Value, json};
use tokio::{net::TcpStream, task::JoinHandle, time::sleep};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header},
    },
};

use crate::{
    client_message::{ClientMessage, StartPayload},
    error::Error,
    handler::{handle_frame, lock},
    response::GraphQLResponse,
    state::SubscriptionState,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(60000);

/// Configuration for a [`GraphQLTestSubscription`]: where the subscription endpoint lives and
/// how patiently the blocking waits poll it.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    host: String,
    port: u16,
    subscription_path: String,
    poll_interval: Duration,
    connection_timeout: Duration,
}

impl SubscriptionConfig {
    /// Constructs a configuration for the subscription endpoint
    /// `ws://<host>:<port><subscription_path>`, with the default 100 ms poll interval and
    /// 60 second acknowledgment/close timeout.
    pub fn new(host: impl Into<String>, port: u16, subscription_path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            subscription_path: subscription_path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    /// Specifies the resolution of all blocking waits. By default the state is polled every
    /// 100 ms.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Specifies how long to wait for the server to acknowledge the connection and to confirm
    /// its closure. By default 60 seconds.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        let path = &self.subscription_path;
        let separator = if path.starts_with('/') { "" } else { "/" };
        format!("ws://{}:{}{}{}", self.host, self.port, separator, path)
    }
}

/// Helper object to test GraphQL subscriptions over the legacy `graphql-ws` protocol.
///
/// One instance drives one subscription at a time: it owns the WebSocket session, sends the
/// lifecycle messages, and buffers the responses a spawned reader task receives so the test can
/// await and assert on them. Call [`reset`](GraphQLTestSubscription::reset) between independent
/// test cases to reuse an instance.
///
/// Every operation fails the calling test (panics) on any contract violation: lifecycle
/// preconditions, malformed server messages, and timeouts alike. There is deliberately no
/// recoverable-error path.
pub struct GraphQLTestSubscription {
    config: SubscriptionConfig,
    state: Arc<Mutex<SubscriptionState>>,
    sender: Option<SplitSink<WsStream, Message>>,
    reader: Option<JoinHandle<()>>,
}

impl GraphQLTestSubscription {
    /// Constructs a test subscription client for the given endpoint configuration. Nothing is
    /// connected until [`init`](GraphQLTestSubscription::init) or
    /// [`start`](GraphQLTestSubscription::start) is called.
    pub fn new(config: SubscriptionConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SubscriptionState::new())),
            sender: None,
            reader: None,
        }
    }

    /// The id of the current subscription attempt, as sent in `start` and `stop` messages.
    pub fn id(&self) -> u64 {
        self.locked().id()
    }

    /// Whether the `connection_init` message has been sent.
    pub fn is_initialized(&self) -> bool {
        self.locked().is_initialized()
    }

    /// Whether the server has acknowledged the connection.
    pub fn is_acknowledged(&self) -> bool {
        self.locked().is_acknowledged()
    }

    /// Whether the `start` message has been sent.
    pub fn is_started(&self) -> bool {
        self.locked().is_started()
    }

    /// Whether the WebSocket session has been closed, for whatever reason.
    pub fn is_stopped(&self) -> bool {
        self.locked().is_stopped()
    }

    /// Whether the server has signaled the end of the subscription stream.
    pub fn is_completed(&self) -> bool {
        self.locked().is_completed()
    }

    /// Opens the WebSocket session and sends the `connection_init` message, then blocks until
    /// the server acknowledges the connection. The payload may be [`None`] if not needed.
    ///
    /// Fails the test if the subscription is already initialized, if the connection cannot be
    /// opened, or if no acknowledgment arrives in time.
    pub async fn init(&mut self, payload: Option<Value>) -> &mut Self {
        if self.is_initialized() {
            panic!("Subscription already initialized.");
        }
        if let Err(e) = self.connect().await {
            panic!(
                "Could not open WebSocket connection to `{}`: {e}",
                self.config.endpoint(),
            );
        }
        let message = ClientMessage::ConnectionInit {
            payload: payload.unwrap_or_else(|| json!({})),
        };
        self.send_message(&message).await;
        self.locked().mark_initialized();
        self.await_condition(
            SubscriptionState::is_acknowledged,
            "connection was not acknowledged by the GraphQL server",
        )
        .await;
        debug!("subscription successfully initialized");
        self
    }

    /// Sends the `start` message for the subscription whose query is stored in the given
    /// resource file, initializing the connection first if needed. The variables may be
    /// [`None`] if the query needs none.
    ///
    /// Fails the test if a start message was already sent or the query resource is unreadable.
    pub async fn start(
        &mut self,
        query_resource: impl AsRef<Path>,
        variables: Option<Value>,
    ) -> &mut Self {
        if !self.is_initialized() {
            self.init(None).await;
        }
        if self.is_started() {
            panic!("Start message already sent. To start a new subscription, call `reset()` first.");
        }
        self.locked().mark_started();
        let message = ClientMessage::Start {
            id: self.id(),
            payload: StartPayload {
                query: load_query(query_resource.as_ref()),
                variables: variables.unwrap_or_else(|| json!({})),
            },
        };
        debug!("sending start message");
        self.send_message(&message).await;
        self
    }

    /// Sends the `stop` message and closes the WebSocket session, then blocks until the closure
    /// is confirmed. The subscription only counts as stopped once the reader task has observed
    /// the connection actually closing.
    ///
    /// Fails the test if the subscription was never initialized or is already stopped.
    pub async fn stop(&mut self) -> &mut Self {
        if !self.is_initialized() {
            panic!("Subscription not yet initialized.");
        }
        if self.is_stopped() {
            panic!("Subscription already stopped.");
        }
        let message = ClientMessage::Stop { id: self.id() };
        debug!("sending stop message");
        self.send_message(&message).await;
        debug!("closing WebSocket session");
        if let Err(e) = self.close_session().await {
            panic!("Could not close WebSocket session: {e}");
        }
        self.await_condition(
            SubscriptionState::is_stopped,
            "connection was not stopped in time",
        )
        .await;
        debug!("WebSocket session closed");
        self
    }

    /// Stops the subscription if needed and resets this instance to a fresh state with a new
    /// id, so it can be reused by the next test case. Typically called in the test teardown.
    pub async fn reset(&mut self) {
        if self.is_initialized() && !self.is_stopped() {
            self.stop().await;
        }
        self.state = Arc::new(Mutex::new(SubscriptionState::new()));
        self.sender = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        debug!("test subscription client reset");
    }

    /// Awaits and returns the next response. The subscription is stopped afterwards when
    /// `stop_after` is set.
    ///
    /// Fails the test if no response arrives within the timeout.
    pub async fn await_and_get_next_response(
        &mut self,
        timeout: Duration,
        stop_after: bool,
    ) -> GraphQLResponse {
        self.await_and_get_next_responses(timeout, 1, stop_after)
            .await
            .remove(0)
    }

    /// Waits the full `timeout` and returns all responses received during that time, in receipt
    /// order. No expectation is made about their number; the returned list may be empty. The
    /// subscription is stopped afterwards when `stop_after` is set.
    pub async fn await_and_get_all_responses(
        &mut self,
        timeout: Duration,
        stop_after: bool,
    ) -> Vec<GraphQLResponse> {
        self.await_and_get_next_responses(timeout, -1, stop_after)
            .await
    }

    /// Waits the full `timeout` and fails the test if any response arrives during that time.
    /// The subscription is stopped afterwards when `stop_after` is set.
    pub async fn wait_and_expect_no_response(
        &mut self,
        timeout: Duration,
        stop_after: bool,
    ) -> &mut Self {
        self.await_and_get_next_responses(timeout, 0, stop_after)
            .await;
        self
    }

    /// Awaits and returns the expected number of responses, in receipt order. This is the core
    /// polling primitive the other await variants delegate to.
    ///
    /// If `expected_count` is positive, returns as soon as that many responses are buffered and
    /// fails the test if the timeout expires first; responses received beyond the expected
    /// count stay buffered for [`take_remaining_responses`]. If zero, waits the full timeout
    /// and fails the test unless no response arrived. If negative, waits the full timeout and
    /// returns whatever arrived without any expectation on the count.
    ///
    /// The subscription is stopped afterwards when `stop_after` is set.
    ///
    /// [`take_remaining_responses`]: GraphQLTestSubscription::take_remaining_responses
    pub async fn await_and_get_next_responses(
        &mut self,
        timeout: Duration,
        expected_count: i32,
        stop_after: bool,
    ) -> Vec<GraphQLResponse> {
        if !self.is_started() {
            panic!("Start message not sent. Send the start message first.");
        }
        if self.is_stopped() {
            panic!("Subscription already stopped. Forgot to call `reset()` between test cases?");
        }

        let interval = self.config.poll_interval;
        let mut elapsed = Duration::ZERO;
        loop {
            let buffered = self.locked().response_count();
            let satisfied = expected_count > 0 && buffered >= expected_count as usize;
            if satisfied || elapsed >= timeout {
                break;
            }
            sleep(interval).await;
            elapsed += interval;
        }

        if stop_after {
            self.stop().await;
        }

        // Check and drain under one lock, so a concurrent append cannot slip in between.
        let mut state = self.locked();
        let buffered = state.response_count();
        if expected_count == 0 && buffered != 0 {
            panic!("Expected no responses in {timeout:?}, but received {buffered}.");
        }
        if expected_count > 0 && buffered < expected_count as usize {
            panic!(
                "Expected at least {expected_count} response(s) in {timeout:?}, but {buffered} received.",
            );
        }
        let count = if expected_count > 0 {
            expected_count as usize
        } else {
            buffered
        };
        let responses = state.poll_responses(count);
        debug!("returning {} responses", responses.len());
        responses
    }

    /// Atomically removes and returns all responses that were received but not returned so far.
    ///
    /// Fails the test if the subscription is not stopped yet.
    pub fn take_remaining_responses(&mut self) -> Vec<GraphQLResponse> {
        if !self.is_stopped() {
            panic!("`take_remaining_responses` should only be called after the subscription was stopped.");
        }
        let mut state = self.locked();
        let buffered = state.response_count();
        state.poll_responses(buffered)
    }

    async fn connect(&mut self) -> Result<(), Error> {
        let endpoint = self.config.endpoint();
        debug!("connecting to `{endpoint}`");
        let mut request = endpoint.into_client_request()?;
        request.headers_mut().insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static("graphql-ws"),
        );
        let (socket, _response) = connect_async(request).await?;
        let (sender, receiver) = socket.split();
        self.sender = Some(sender);
        self.reader = Some(spawn_reader(Arc::clone(&self.state), receiver));
        Ok(())
    }

    async fn send_message(&mut self, message: &ClientMessage) {
        if let Err(e) = self.try_send(message).await {
            panic!("Could not send message over the WebSocket session: {e}");
        }
    }

    async fn try_send(&mut self, message: &ClientMessage) -> Result<(), Error> {
        let frame = serde_json::to_string(message)?;
        debug!("sending frame: {frame}");
        let sender = self.sender.as_mut().ok_or(Error::NotConnected)?;
        sender.send(Message::text(frame)).await?;
        Ok(())
    }

    async fn close_session(&mut self) -> Result<(), Error> {
        let sender = self.sender.as_mut().ok_or(Error::NotConnected)?;
        sender.close().await?;
        Ok(())
    }

    async fn await_condition(
        &self,
        condition: fn(&SubscriptionState) -> bool,
        description: &str,
    ) {
        let interval = self.config.poll_interval;
        let timeout = self.config.connection_timeout;
        let mut elapsed = Duration::ZERO;
        while !condition(&self.locked()) && elapsed < timeout {
            sleep(interval).await;
            elapsed += interval;
        }
        if !condition(&self.locked()) {
            panic!("Timeout after {elapsed:?}: {description}.");
        }
    }

    /// Locks the shared state, re-raising any failure the reader task has recorded so protocol
    /// violations fail the calling test rather than dying with the reader.
    fn locked(&self) -> MutexGuard<'_, SubscriptionState> {
        let state = lock(&self.state);
        if let Some(failure) = state.failure() {
            panic!("Invalid message received from the GraphQL server: {failure}");
        }
        state
    }
}

/// Spawns the reader task for one WebSocket session: the delivery context that feeds inbound
/// frames to the handler. It is the only writer of the `stopped` flag, which it sets once the
/// inbound stream ends, no matter why.
fn spawn_reader(
    state: Arc<Mutex<SubscriptionState>>,
    mut receiver: SplitStream<WsStream>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(next) = receiver.next().await {
            match next {
                Ok(Message::Text(frame)) => {
                    if let Err(e) = handle_frame(&state, frame.as_str()) {
                        lock(&state).record_failure(e.to_string());
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("close frame received");
                    break;
                }
                // Pings and pongs are answered by the transport itself; binary frames are not
                // part of the protocol.
                Ok(_) => {}
                Err(e) => {
                    debug!("WebSocket session ended with an error: {e}");
                    break;
                }
            }
        }
        lock(&state).mark_stopped();
    })
}

fn load_query(resource: &Path) -> String {
    fs::read_to_string(resource).unwrap_or_else(|e| {
        panic!(
            "Test setup failure - could not load GraphQL resource `{}`: {e}",
            resource.display(),
        )
    })
}
