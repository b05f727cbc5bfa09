use crate::arc_executor::ArcScriptExecutor;
use crate::config::{IdleBehavior, RunnerConfig};
use crate::context::RunContext;
use crate::delta::{Element, OutputSink};
use crate::error::{EngineError, Result};
use crate::events::{EventBroadcaster, ScriptRunnerEvent};
use crate::request::{RequestQueue, RerunData, ScriptRequest};
use crate::script::{RunOutcome, ScriptExecutor};
use crate::widgets::{WidgetStates, WidgetStore};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use shared::SessionId;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    Idle,
    Running,
    Stopping,
    ShutDown,
}

#[derive(Debug)]
struct RunnerShared {
    state: Mutex<ScriptState>,
    fatal: Mutex<Option<String>>,
}

impl RunnerShared {
    fn set_state(&self, state: ScriptState) {
        *self.state.lock() = state;
    }
}

pub struct ScriptRunnerBuilder {
    script_path: PathBuf,
    sink: Box<dyn OutputSink + Send>,
    argv: Vec<String>,
    widget_states: Option<WidgetStates>,
    request_queue: Option<Arc<RequestQueue>>,
    executor: Option<Box<dyn ScriptExecutor + Send>>,
    config: RunnerConfig,
    session_id: Option<SessionId>,
}

impl ScriptRunnerBuilder {
    #[must_use]
    pub fn argv<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = argv.into_iter().map(Into::into).collect();
        self
    }

    /// Widget values the first run starts from.
    #[must_use]
    pub fn widget_states(mut self, widget_states: WidgetStates) -> Self {
        self.widget_states = Some(widget_states);
        self
    }

    /// Shares an existing queue instead of creating a private one.
    #[must_use]
    pub fn request_queue(mut self, request_queue: Arc<RequestQueue>) -> Self {
        self.request_queue = Some(request_queue);
        self
    }

    #[must_use]
    pub fn executor<E>(mut self, executor: E) -> Self
    where
        E: ScriptExecutor + Send + 'static,
    {
        self.executor = Some(Box::new(executor));
        self
    }

    /// Same as [`ScriptRunnerBuilder::executor`], with the closure signature
    /// spelled out so that argument types are inferred.
    #[must_use]
    pub fn executor_fn<F>(self, executor: F) -> Self
    where
        F: FnMut(&Path, &[String], &mut RunContext<'_>) -> RunOutcome + Send + 'static,
    {
        self.executor(executor)
    }

    #[must_use]
    pub fn config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    #[must_use]
    pub fn build(self) -> ScriptRunner {
        let session_id = self.session_id.unwrap_or_default();
        let queue = self.request_queue.unwrap_or_default();
        let events = Arc::new(EventBroadcaster::new());
        let shared = Arc::new(RunnerShared {
            state: Mutex::new(ScriptState::Idle),
            fatal: Mutex::new(None),
        });

        let mut widgets = WidgetStore::new();
        widgets.apply_snapshot(self.widget_states.as_ref());

        let worker = Worker {
            session_id: session_id.clone(),
            script_path: self.script_path,
            argv: self.argv,
            initial_states: self.widget_states,
            widgets,
            queue: Arc::clone(&queue),
            events: Arc::clone(&events),
            shared: Arc::clone(&shared),
            sink: self.sink,
            executor: self
                .executor
                .unwrap_or_else(|| Box::new(ArcScriptExecutor::new())),
            idle_behavior: self.config.idle_behavior,
        };

        ScriptRunner {
            session_id,
            queue,
            events,
            shared,
            thread_name_prefix: self.config.thread_name_prefix,
            worker: Some(worker),
            handle: None,
        }
    }
}

/// Reruns one script on a dedicated thread as requests arrive.
///
/// Requests go through the [`RequestQueue`]; lifecycle events are delivered
/// through [`ScriptRunner::events`] and script output through the sink given
/// to [`ScriptRunner::builder`].
pub struct ScriptRunner {
    session_id: SessionId,
    queue: Arc<RequestQueue>,
    events: Arc<EventBroadcaster>,
    shared: Arc<RunnerShared>,
    thread_name_prefix: String,
    worker: Option<Worker>,
    handle: Option<JoinHandle<()>>,
}

impl ScriptRunner {
    pub fn builder<S>(script_path: impl Into<PathBuf>, sink: S) -> ScriptRunnerBuilder
    where
        S: OutputSink + Send + 'static,
    {
        ScriptRunnerBuilder {
            script_path: script_path.into(),
            sink: Box::new(sink),
            argv: Vec::new(),
            widget_states: None,
            request_queue: None,
            executor: None,
            config: RunnerConfig::default(),
            session_id: None,
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub const fn request_queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    #[must_use]
    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Subscribes a channel to lifecycle events. Call before [`ScriptRunner::start`]
    /// to see every event.
    #[must_use]
    pub fn event_channel(&self) -> Receiver<ScriptRunnerEvent> {
        self.events.channel()
    }

    pub fn enqueue_rerun(&self, data: RerunData) {
        self.queue.enqueue(ScriptRequest::Rerun(data));
    }

    pub fn enqueue_stop(&self) {
        self.queue.enqueue(ScriptRequest::Stop);
    }

    pub fn enqueue_shutdown(&self) {
        self.queue.enqueue(ScriptRequest::Shutdown);
    }

    #[must_use]
    pub fn state(&self) -> ScriptState {
        *self.shared.state.lock()
    }

    /// The panic that stopped the run thread, if any.
    #[must_use]
    pub fn fatal_error(&self) -> Option<EngineError> {
        self.shared
            .fatal
            .lock()
            .clone()
            .map(EngineError::WorkerPanicked)
    }

    /// Spawns the run thread. Can be called once.
    pub fn start(&mut self) -> Result<()> {
        let worker = self.worker.take().ok_or(EngineError::AlreadyStarted)?;
        let name = format!("{}-{}", self.thread_name_prefix, self.session_id);
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || worker.run())?;

        self.handle = Some(handle);
        info!("[{}] Run thread started", self.session_id);
        Ok(())
    }

    /// Waits for the run thread to exit. Returns immediately if it was never
    /// started.
    pub fn join(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if let Err(payload) = handle.join() {
            return Err(EngineError::WorkerPanicked(panic_message(payload.as_ref())));
        }
        self.fatal_error().map_or(Ok(()), Err)
    }
}

impl Drop for ScriptRunner {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.queue.enqueue(ScriptRequest::Shutdown);
            if let Err(e) = self.join() {
                warn!("[{}] {e}", self.session_id);
            }
        }
    }
}

/// State owned by the run thread.
struct Worker {
    session_id: SessionId,
    script_path: PathBuf,
    argv: Vec<String>,
    initial_states: Option<WidgetStates>,
    widgets: WidgetStore,
    queue: Arc<RequestQueue>,
    events: Arc<EventBroadcaster>,
    shared: Arc<RunnerShared>,
    sink: Box<dyn OutputSink + Send>,
    executor: Box<dyn ScriptExecutor + Send>,
    idle_behavior: IdleBehavior,
}

impl Worker {
    fn run(mut self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.process_requests()));
        if let Err(payload) = result {
            // Only an observer can panic here; drop them all so that channel
            // receivers disconnect instead of waiting for SHUTDOWN.
            let message = panic_message(payload.as_ref());
            error!("[{}] Event observer panicked: {message}", self.session_id);
            let mut fatal = self.shared.fatal.lock();
            if fatal.is_none() {
                *fatal = Some(message);
            }
            drop(fatal);
            self.shared.set_state(ScriptState::ShutDown);
            self.events.clear();
        }
    }

    fn process_requests(&mut self) {
        let mut request = self.next_idle_request();
        loop {
            match request {
                ScriptRequest::Shutdown => break,
                ScriptRequest::Stop => {
                    debug!("[{}] STOP ignored while idle", self.session_id);
                    request = self.next_idle_request();
                }
                ScriptRequest::Rerun(data) => {
                    request = match self.run_script(data) {
                        Some(ScriptRequest::Stop) | None => self.next_idle_request(),
                        Some(next) => next,
                    };
                }
            }
        }

        self.shared.set_state(ScriptState::ShutDown);
        self.events.broadcast(&ScriptRunnerEvent::Shutdown);
        info!("[{}] Run thread shut down", self.session_id);
    }

    fn next_idle_request(&self) -> ScriptRequest {
        self.shared.set_state(ScriptState::Idle);
        match self.idle_behavior {
            IdleBehavior::Wait => self.queue.wait_dequeue(),
            IdleBehavior::ExitWhenDrained => self
                .queue
                .try_dequeue()
                .unwrap_or(ScriptRequest::Shutdown),
        }
    }

    /// Executes the script once and returns the request that interrupted it,
    /// if any.
    fn run_script(&mut self, data: RerunData) -> Option<ScriptRequest> {
        let RerunData {
            argv,
            widget_states,
        } = data;
        if let Some(argv) = argv {
            self.argv = argv;
        }
        let initial = self.initial_states.take();
        self.widgets
            .apply_snapshot(widget_states.as_ref().or(initial.as_ref()));

        self.shared.set_state(ScriptState::Running);
        info!(
            "[{}] Running {} {:?}",
            self.session_id,
            self.script_path.display(),
            self.argv
        );
        self.events.broadcast(&ScriptRunnerEvent::ScriptStarted);

        let mut ctx = RunContext::new(
            self.sink.as_mut(),
            &self.queue,
            self.widgets.current_snapshot(),
        );
        let session_id = &self.session_id;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let outcome = self
                .executor
                .execute(&self.script_path, &self.argv, &mut ctx);
            finish_run(session_id, outcome, &mut ctx)
        }));

        let event = match result {
            Ok(event) => event,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("[{}] Script run panicked: {message}", self.session_id);
                *self.shared.fatal.lock() = Some(message);
                self.events
                    .broadcast(&ScriptRunnerEvent::ScriptStoppedWithSuccess);
                return Some(ScriptRequest::Shutdown);
            }
        };

        let emitted = ctx.emitted();
        let interruption = ctx.into_interruption();
        match &interruption {
            Some(request) => {
                self.shared.set_state(ScriptState::Stopping);
                info!(
                    "[{}] Run interrupted by {} after {emitted} deltas",
                    self.session_id,
                    request.name()
                );
            }
            None => debug!("[{}] Run finished after {emitted} deltas", self.session_id),
        }

        self.events.broadcast(&event);
        interruption
    }
}

/// Maps the executor's outcome to the run's terminal event.
fn finish_run(
    session_id: &SessionId,
    outcome: RunOutcome,
    ctx: &mut RunContext<'_>,
) -> ScriptRunnerEvent {
    match outcome {
        RunOutcome::CompileError(details) => {
            if ctx.emitted() > 0 {
                warn!(
                    "[{session_id}] Compile error reported after {} deltas",
                    ctx.emitted()
                );
            }
            warn!("[{session_id}] Compile error: {details}");
            ScriptRunnerEvent::ScriptStoppedWithCompileError { details }
        }
        RunOutcome::RuntimeError(message) => {
            warn!("[{session_id}] Runtime error: {message}");
            if !ctx.emit_final(Element::Exception { message }) {
                debug!("[{session_id}] Dropped exception of interrupted run");
            }
            ScriptRunnerEvent::ScriptStoppedWithSuccess
        }
        RunOutcome::Success | RunOutcome::Interrupted => ScriptRunnerEvent::ScriptStoppedWithSuccess,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
