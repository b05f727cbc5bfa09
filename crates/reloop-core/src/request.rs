use crate::widgets::WidgetStates;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Parameters of a rerun. `None` fields keep whatever the previous run used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RerunData {
    pub argv: Option<Vec<String>>,
    pub widget_states: Option<WidgetStates>,
}

impl RerunData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_argv<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = Some(argv.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_widget_states(mut self, widget_states: WidgetStates) -> Self {
        self.widget_states = Some(widget_states);
        self
    }

    /// Folds a newer request into this pending one.
    fn coalesce(self, newer: Self) -> Self {
        Self {
            argv: newer.argv.or(self.argv),
            widget_states: newer.widget_states.or(self.widget_states),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRequest {
    Rerun(RerunData),
    Stop,
    Shutdown,
}

impl ScriptRequest {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Rerun(_) => "RERUN",
            Self::Stop => "STOP",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<ScriptRequest>,
    shutdown: bool,
}

impl QueueState {
    fn take(&mut self) -> Option<ScriptRequest> {
        if self.shutdown {
            Some(ScriptRequest::Shutdown)
        } else {
            self.pending.pop_front()
        }
    }
}

/// Mailbox between request producers and the run thread.
///
/// Holds at most one `Rerun`. Once `Shutdown` is enqueued every other
/// pending request is dropped and every dequeue returns `Shutdown`.
#[derive(Debug, Default)]
pub struct RequestQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl RequestQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, request: ScriptRequest) {
        let mut state = self.state.lock();
        if state.shutdown {
            debug!("Ignoring {} after shutdown", request.name());
            return;
        }

        match request {
            ScriptRequest::Shutdown => {
                state.shutdown = true;
                state.pending.clear();
            }
            ScriptRequest::Stop => {
                if matches!(state.pending.back(), Some(ScriptRequest::Stop)) {
                    debug!("STOP already pending");
                } else {
                    state.pending.push_back(ScriptRequest::Stop);
                }
            }
            ScriptRequest::Rerun(data) => {
                let existing = state
                    .pending
                    .iter()
                    .position(|r| matches!(r, ScriptRequest::Rerun(_)));
                let merged = match existing.and_then(|i| state.pending.remove(i)) {
                    Some(ScriptRequest::Rerun(previous)) => {
                        debug!("Coalescing RERUN with pending RERUN");
                        previous.coalesce(data)
                    }
                    _ => data,
                };
                state.pending.push_back(ScriptRequest::Rerun(merged));
            }
        }
        drop(state);

        self.available.notify_all();
    }

    /// Non-blocking poll used at checkpoints.
    #[must_use]
    pub fn try_dequeue(&self) -> Option<ScriptRequest> {
        self.state.lock().take()
    }

    /// Blocks until a request is available.
    #[must_use]
    pub fn wait_dequeue(&self) -> ScriptRequest {
        let mut state = self.state.lock();
        loop {
            if let Some(request) = state.take() {
                return request;
            }
            self.available.wait(&mut state);
        }
    }

    /// Waits up to `timeout` for a request without taking it. Returns
    /// whether one is pending.
    pub fn wait_for_request(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.shutdown && state.pending.is_empty() {
            if self.available.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.shutdown || !state.pending.is_empty()
    }

    #[must_use]
    pub fn has_request(&self) -> bool {
        let state = self.state.lock();
        state.shutdown || !state.pending.is_empty()
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.state.lock().shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::WidgetValue;
    use std::sync::Arc;
    use std::thread;

    fn states(id: &str, value: i64) -> WidgetStates {
        WidgetStates::new().with(id, WidgetValue::Int(value))
    }

    #[test]
    fn test_reruns_coalesce_into_one() {
        let queue = RequestQueue::new();
        queue.enqueue(ScriptRequest::Rerun(RerunData::new()));
        queue.enqueue(ScriptRequest::Rerun(RerunData::new()));
        queue.enqueue(ScriptRequest::Rerun(RerunData::new()));

        assert_eq!(
            queue.try_dequeue(),
            Some(ScriptRequest::Rerun(RerunData::new()))
        );
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn test_newest_fields_win_and_missing_fields_carry_forward() {
        let queue = RequestQueue::new();
        queue.enqueue(ScriptRequest::Rerun(
            RerunData::new()
                .with_argv(["old"])
                .with_widget_states(states("radio-r", 1)),
        ));
        queue.enqueue(ScriptRequest::Rerun(RerunData::new().with_argv(["new"])));

        let Some(ScriptRequest::Rerun(data)) = queue.try_dequeue() else {
            panic!("expected a rerun");
        };
        assert_eq!(data.argv, Some(vec!["new".to_string()]));
        assert_eq!(data.widget_states, Some(states("radio-r", 1)));

        queue.enqueue(ScriptRequest::Rerun(
            RerunData::new().with_widget_states(states("radio-r", 1)),
        ));
        queue.enqueue(ScriptRequest::Rerun(
            RerunData::new().with_widget_states(states("radio-r", 2)),
        ));
        let Some(ScriptRequest::Rerun(data)) = queue.try_dequeue() else {
            panic!("expected a rerun");
        };
        assert_eq!(data.widget_states, Some(states("radio-r", 2)));
        assert_eq!(data.argv, None);
    }

    #[test]
    fn test_stop_is_not_swallowed_by_rerun() {
        let queue = RequestQueue::new();
        queue.enqueue(ScriptRequest::Rerun(RerunData::new()));
        queue.enqueue(ScriptRequest::Stop);
        queue.enqueue(ScriptRequest::Rerun(RerunData::new().with_argv(["x"])));

        assert_eq!(queue.try_dequeue(), Some(ScriptRequest::Stop));
        assert_eq!(
            queue.try_dequeue(),
            Some(ScriptRequest::Rerun(RerunData::new().with_argv(["x"])))
        );
        assert!(!queue.has_request());
    }

    #[test]
    fn test_repeated_stops_collapse() {
        let queue = RequestQueue::new();
        for _ in 0..1000 {
            queue.enqueue(ScriptRequest::Stop);
        }
        queue.enqueue(ScriptRequest::Rerun(RerunData::new()));
        queue.enqueue(ScriptRequest::Stop);
        queue.enqueue(ScriptRequest::Stop);

        assert_eq!(queue.try_dequeue(), Some(ScriptRequest::Stop));
        assert_eq!(
            queue.try_dequeue(),
            Some(ScriptRequest::Rerun(RerunData::new()))
        );
        assert_eq!(queue.try_dequeue(), Some(ScriptRequest::Stop));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn test_shutdown_wins_and_sticks() {
        let queue = RequestQueue::new();
        queue.enqueue(ScriptRequest::Rerun(RerunData::new()));
        queue.enqueue(ScriptRequest::Stop);
        queue.enqueue(ScriptRequest::Shutdown);
        queue.enqueue(ScriptRequest::Rerun(RerunData::new()));

        assert!(queue.is_shutdown_requested());
        assert_eq!(queue.try_dequeue(), Some(ScriptRequest::Shutdown));
        assert_eq!(queue.try_dequeue(), Some(ScriptRequest::Shutdown));
        assert!(queue.has_request());
    }

    #[test]
    fn test_wait_dequeue_wakes_on_enqueue() {
        let queue = Arc::new(RequestQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_dequeue())
        };

        thread::sleep(Duration::from_millis(20));
        queue.enqueue(ScriptRequest::Stop);

        assert_eq!(consumer.join().unwrap(), ScriptRequest::Stop);
    }

    #[test]
    fn test_wait_for_request_returns_early() {
        let queue = Arc::new(RequestQueue::new());
        assert!(!queue.wait_for_request(Duration::from_millis(10)));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.enqueue(ScriptRequest::Stop);
            })
        };
        let started = Instant::now();
        assert!(queue.wait_for_request(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        producer.join().unwrap();

        assert_eq!(queue.try_dequeue(), Some(ScriptRequest::Stop));
    }

    #[test]
    fn test_concurrent_producers_leave_single_rerun() {
        let queue = Arc::new(RequestQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|n| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..50 {
                        queue.enqueue(ScriptRequest::Rerun(
                            RerunData::new().with_argv([format!("{n}-{i}")]),
                        ));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert!(matches!(queue.try_dequeue(), Some(ScriptRequest::Rerun(_))));
        assert_eq!(queue.try_dequeue(), None);
    }
}
