use parking_lot::RwLock;
use std::fmt;
use std::sync::mpsc::{self, Receiver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRunnerEvent {
    ScriptStarted,
    ScriptStoppedWithSuccess,
    ScriptStoppedWithCompileError { details: String },
    Shutdown,
}

impl ScriptRunnerEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ScriptStarted => "SCRIPT_STARTED",
            Self::ScriptStoppedWithSuccess => "SCRIPT_STOPPED_WITH_SUCCESS",
            Self::ScriptStoppedWithCompileError { .. } => "SCRIPT_STOPPED_WITH_COMPILE_ERROR",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for ScriptRunnerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScriptStoppedWithCompileError { details } => {
                write!(f, "{}: {details}", self.name())
            }
            other => write!(f, "{}", other.name()),
        }
    }
}

type Observer = Box<dyn Fn(&ScriptRunnerEvent) + Send + Sync>;

/// Delivers lifecycle events to every observer, in subscription order, on
/// the run thread.
///
/// Observers must return quickly and must not subscribe from inside a
/// callback.
#[derive(Default)]
pub struct EventBroadcaster {
    observers: RwLock<Vec<Observer>>,
}

impl EventBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&ScriptRunnerEvent) + Send + Sync + 'static,
    {
        self.observers.write().push(Box::new(observer));
    }

    /// Subscribes a forwarder and returns the receiving end.
    #[must_use]
    pub fn channel(&self) -> Receiver<ScriptRunnerEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    pub fn broadcast(&self, event: &ScriptRunnerEvent) {
        for observer in self.observers.read().iter() {
            observer(event);
        }
    }

    /// Drops every observer, disconnecting their channels.
    pub(crate) fn clear(&self) {
        self.observers.write().clear();
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_observers_run_in_subscription_order() {
        let broadcaster = EventBroadcaster::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            broadcaster.subscribe(move |event| seen.lock().push(format!("{tag}:{}", event.name())));
        }

        broadcaster.broadcast(&ScriptRunnerEvent::ScriptStarted);

        assert_eq!(
            *seen.lock(),
            vec!["first:SCRIPT_STARTED", "second:SCRIPT_STARTED"]
        );
        assert_eq!(broadcaster.observer_count(), 2);
    }

    #[test]
    fn test_channel_receives_clones() {
        let broadcaster = EventBroadcaster::new();
        let rx = broadcaster.channel();
        let event = ScriptRunnerEvent::ScriptStoppedWithCompileError {
            details: "line 1".into(),
        };

        broadcaster.broadcast(&event);
        broadcaster.broadcast(&ScriptRunnerEvent::Shutdown);

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![event, ScriptRunnerEvent::Shutdown]);
    }

    #[test]
    fn test_clear_disconnects_channels() {
        let broadcaster = EventBroadcaster::new();
        let rx = broadcaster.channel();
        broadcaster.clear();

        assert_eq!(broadcaster.observer_count(), 0);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_display_includes_details() {
        let event = ScriptRunnerEvent::ScriptStoppedWithCompileError {
            details: "missing '}'".into(),
        };
        assert_eq!(
            event.to_string(),
            "SCRIPT_STOPPED_WITH_COMPILE_ERROR: missing '}'"
        );
        assert_eq!(ScriptRunnerEvent::Shutdown.to_string(), "SHUTDOWN");
    }
}
