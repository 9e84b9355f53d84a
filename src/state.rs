use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::response::GraphQLResponse;

/// Source of subscription ids, unique across all test subscriptions in the process.
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Mutable record of one subscription attempt: its lifecycle flags and the buffer of responses
/// received so far.
///
/// All lifecycle flags are monotonic: once set they are never cleared again for the lifetime of
/// the instance. `reset` on the driver replaces the whole instance instead of clearing anything.
///
/// The state is written from the transport's reader task and read from the caller's task, so a
/// driver always keeps it behind a single `Mutex`; everything here assumes the caller already
/// holds that lock.
#[derive(Debug)]
pub(crate) struct SubscriptionState {
    id: u64,
    initialized: bool,
    acknowledged: bool,
    started: bool,
    stopped: bool,
    completed: bool,
    responses: VecDeque<GraphQLResponse>,
    failure: Option<String>,
}

impl SubscriptionState {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed),
            initialized: false,
            acknowledged: false,
            started: false,
            stopped: false,
            completed: false,
            responses: VecDeque::new(),
            failure: None,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub(crate) fn mark_acknowledged(&mut self) {
        self.acknowledged = true;
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.stopped = true;
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }

    pub(crate) fn push_response(&mut self, response: GraphQLResponse) {
        self.responses.push_back(response);
    }

    pub(crate) fn response_count(&self) -> usize {
        self.responses.len()
    }

    /// Removes and returns up to `count` responses from the front of the buffer, in receipt
    /// order.
    pub(crate) fn poll_responses(&mut self, count: usize) -> Vec<GraphQLResponse> {
        self.responses
            .drain(..count.min(self.responses.len()))
            .collect()
    }

    /// Records a failure detected on the reader task, to be re-raised on the caller's task. The
    /// first failure wins.
    pub(crate) fn record_failure(&mut self, message: String) {
        self.failure.get_or_insert(message);
    }

    pub(crate) fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let first = SubscriptionState::new();
        let second = SubscriptionState::new();
        assert!(second.id() > first.id());
    }

    #[test]
    fn test_flags_start_cleared_and_stay_set() {
        let mut state = SubscriptionState::new();
        assert!(!state.is_initialized());
        assert!(!state.is_acknowledged());
        assert!(!state.is_started());
        assert!(!state.is_stopped());
        assert!(!state.is_completed());

        state.mark_initialized();
        state.mark_acknowledged();
        state.mark_started();
        state.mark_stopped();
        state.mark_completed();

        // Setting a flag twice must not flip anything back.
        state.mark_stopped();
        state.mark_completed();

        assert!(state.is_initialized());
        assert!(state.is_acknowledged());
        assert!(state.is_started());
        assert!(state.is_stopped());
        assert!(state.is_completed());
    }

    #[test]
    fn test_responses_drain_in_receipt_order() {
        let mut state = SubscriptionState::new();
        for i in 0..3 {
            state.push_response(GraphQLResponse::new(json!({"data": {"tick": i}})));
        }
        assert_eq!(state.response_count(), 3);

        let drained = state.poll_responses(2);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].get("data.tick"), Some(&json!(0)));
        assert_eq!(drained[1].get("data.tick"), Some(&json!(1)));
        assert_eq!(state.response_count(), 1);

        // Draining more than buffered returns what is there.
        let rest = state.poll_responses(5);
        assert_eq!(rest.len(), 1);
        assert_eq!(state.response_count(), 0);
    }

    #[test]
    fn test_first_failure_wins() {
        let mut state = SubscriptionState::new();
        state.record_failure("first".into());
        state.record_failure("second".into());
        assert_eq!(state.failure(), Some("first"));
    }
}
