use crate::context::{Interrupted, RunContext};
use std::path::Path;

/// How a single execution ended, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// The script could not be loaded or compiled. No script logic ran.
    CompileError(String),
    /// The script failed part way through.
    RuntimeError(String),
    Interrupted,
}

impl From<Interrupted> for RunOutcome {
    fn from(_: Interrupted) -> Self {
        Self::Interrupted
    }
}

impl From<Result<(), Interrupted>> for RunOutcome {
    fn from(result: Result<(), Interrupted>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(interrupted) => interrupted.into(),
        }
    }
}

/// Loads and runs a script, writing every observable action through `ctx`.
pub trait ScriptExecutor {
    fn execute(&mut self, script_path: &Path, argv: &[String], ctx: &mut RunContext<'_>)
    -> RunOutcome;
}

impl<F> ScriptExecutor for F
where
    F: FnMut(&Path, &[String], &mut RunContext<'_>) -> RunOutcome,
{
    fn execute(
        &mut self,
        script_path: &Path,
        argv: &[String],
        ctx: &mut RunContext<'_>,
    ) -> RunOutcome {
        self(script_path, argv, ctx)
    }
}
