pub mod arc_executor;
pub mod config;
pub mod constants;
pub mod context;
pub mod delta;
pub mod error;
pub mod events;
pub mod request;
pub mod runner;
pub mod script;
pub mod widgets;

pub use arc_executor::ArcScriptExecutor;
pub use config::{IdleBehavior, RunnerConfig};
pub use constants::RunnerConstants;
pub use context::{Interrupted, RunContext};
pub use delta::{Delta, DeltaQueue, Element, OutputSink};
pub use error::{ConfigError, EngineError};
pub use events::{EventBroadcaster, ScriptRunnerEvent};
pub use request::{RequestQueue, RerunData, ScriptRequest};
pub use runner::{ScriptRunner, ScriptRunnerBuilder, ScriptState};
pub use script::{RunOutcome, ScriptExecutor};
pub use widgets::{WidgetKind, WidgetState, WidgetStates, WidgetStore, WidgetValue, WidgetValues};
