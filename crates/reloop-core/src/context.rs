use crate::delta::{Delta, Element, OutputSink};
use crate::request::{RequestQueue, ScriptRequest};
use crate::widgets::{WidgetValue, WidgetValues};
use log::{debug, warn};
use std::fmt;
use std::time::Duration;

/// Returned by [`RunContext`] once a checkpoint saw a pending request.
/// Executors propagate it with `?` and return early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script run interrupted")
    }
}

impl std::error::Error for Interrupted {}

/// Everything one script run may touch: the widget values it started
/// with, the output sink and the request queue polled at checkpoints.
pub struct RunContext<'a> {
    sink: &'a mut dyn OutputSink,
    queue: &'a RequestQueue,
    widgets: WidgetValues,
    next_index: usize,
    emitted: usize,
    interruption: Option<ScriptRequest>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        sink: &'a mut dyn OutputSink,
        queue: &'a RequestQueue,
        widgets: WidgetValues,
    ) -> Self {
        Self {
            sink,
            queue,
            widgets,
            next_index: 0,
            emitted: 0,
            interruption: None,
        }
    }

    #[must_use]
    pub const fn widgets(&self) -> &WidgetValues {
        &self.widgets
    }

    #[must_use]
    pub fn widget_value(&self, id: &str) -> Option<&WidgetValue> {
        self.widgets.get(id)
    }

    /// Appends `element` in the next free slot and returns that slot.
    pub fn emit(&mut self, element: Element) -> Result<usize, Interrupted> {
        self.ensure_running()?;
        let index = self.next_index;
        self.next_index += 1;
        self.send(Delta { index, element });
        self.checkpoint()?;
        Ok(index)
    }

    /// Rewrites a slot handed out earlier by [`RunContext::emit`].
    pub fn replace(&mut self, index: usize, element: Element) -> Result<(), Interrupted> {
        self.ensure_running()?;
        if index >= self.next_index {
            warn!("Replacing slot {index} that was never emitted");
            self.next_index = index + 1;
        }
        self.send(Delta { index, element });
        self.checkpoint()
    }

    /// Polls the request queue without blocking. Any pending request ends
    /// the run; it is kept for the engine to act on.
    pub fn checkpoint(&mut self) -> Result<(), Interrupted> {
        self.ensure_running()?;
        if let Some(request) = self.queue.try_dequeue() {
            debug!("Checkpoint observed {}", request.name());
            self.interruption = Some(request);
            return Err(Interrupted);
        }
        Ok(())
    }

    /// Blocks for `duration`, waking early when a request arrives. A request
    /// that cut the sleep short interrupts the run like a checkpoint.
    pub fn sleep(&mut self, duration: Duration) -> Result<(), Interrupted> {
        self.ensure_running()?;
        if self.queue.wait_for_request(duration) {
            return self.checkpoint();
        }
        Ok(())
    }

    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        self.interruption.is_some()
    }

    /// Number of deltas sent to the sink during this run.
    #[must_use]
    pub const fn emitted(&self) -> usize {
        self.emitted
    }

    /// Appends a final element without polling the queue. Refused once the
    /// run has been interrupted.
    pub(crate) fn emit_final(&mut self, element: Element) -> bool {
        if self.is_interrupted() {
            return false;
        }
        let index = self.next_index;
        self.next_index += 1;
        self.send(Delta { index, element });
        true
    }

    pub(crate) fn into_interruption(self) -> Option<ScriptRequest> {
        self.interruption
    }

    const fn ensure_running(&self) -> Result<(), Interrupted> {
        if self.is_interrupted() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    fn send(&mut self, delta: Delta) {
        self.emitted += 1;
        self.sink.emit(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RerunData;
    use crate::widgets::{WidgetStates, WidgetStore};

    fn text(body: &str) -> Element {
        Element::Text { body: body.into() }
    }

    #[test]
    fn test_emit_assigns_consecutive_slots() {
        let queue = RequestQueue::new();
        let mut sink: Vec<Delta> = Vec::new();
        let mut ctx = RunContext::new(&mut sink, &queue, WidgetValues::default());

        assert_eq!(ctx.emit(Element::Empty), Ok(0));
        assert_eq!(ctx.emit(text("b")), Ok(1));
        assert_eq!(ctx.replace(0, text("a")), Ok(()));
        assert_eq!(ctx.emitted(), 3);
        drop(ctx);

        let slots: Vec<usize> = sink.iter().map(|d| d.index).collect();
        assert_eq!(slots, vec![0, 1, 0]);
    }

    #[test]
    fn test_pending_request_interrupts_after_delivery() {
        let queue = RequestQueue::new();
        let mut sink: Vec<Delta> = Vec::new();
        let mut ctx = RunContext::new(&mut sink, &queue, WidgetValues::default());

        ctx.emit(text("one")).unwrap();
        queue.enqueue(ScriptRequest::Stop);
        assert_eq!(ctx.emit(text("two")), Err(Interrupted));
        assert!(ctx.is_interrupted());

        assert_eq!(ctx.emit(text("three")), Err(Interrupted));
        assert_eq!(ctx.replace(0, text("again")), Err(Interrupted));
        assert!(!ctx.emit_final(text("late")));

        assert_eq!(ctx.into_interruption(), Some(ScriptRequest::Stop));
        assert_eq!(sink.len(), 2);
        assert!(!queue.has_request());
    }

    #[test]
    fn test_checkpoint_keeps_rerun_for_engine() {
        let queue = RequestQueue::new();
        let mut sink: Vec<Delta> = Vec::new();
        let mut ctx = RunContext::new(&mut sink, &queue, WidgetValues::default());

        assert_eq!(ctx.checkpoint(), Ok(()));
        let rerun = ScriptRequest::Rerun(RerunData::new().with_argv(["again"]));
        queue.enqueue(rerun.clone());
        assert_eq!(ctx.checkpoint(), Err(Interrupted));
        assert_eq!(ctx.into_interruption(), Some(rerun));
    }

    #[test]
    fn test_sleep_ends_at_pending_request() {
        let queue = RequestQueue::new();
        let mut sink: Vec<Delta> = Vec::new();
        let mut ctx = RunContext::new(&mut sink, &queue, WidgetValues::default());

        assert_eq!(ctx.sleep(Duration::from_millis(1)), Ok(()));
        queue.enqueue(ScriptRequest::Stop);
        let started = std::time::Instant::now();
        assert_eq!(ctx.sleep(Duration::from_secs(10)), Err(Interrupted));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(ctx.into_interruption(), Some(ScriptRequest::Stop));
    }

    #[test]
    fn test_widget_values_visible() {
        let mut store = WidgetStore::new();
        store.apply_snapshot(Some(
            &WidgetStates::new().with("checkbox-c", WidgetValue::Bool(true)),
        ));
        let queue = RequestQueue::new();
        let mut sink: Vec<Delta> = Vec::new();
        let ctx = RunContext::new(&mut sink, &queue, store.current_snapshot());

        assert_eq!(ctx.widget_value("checkbox-c"), Some(&WidgetValue::Bool(true)));
        assert_eq!(ctx.widget_value("checkbox-d"), None);
        assert_eq!(ctx.widgets().len(), 1);
    }
}
