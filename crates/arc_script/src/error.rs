use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("syntax error at {line}:{column}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct RuntimeError {
    pub message: String,
    pub line: usize,
}

/// Why a program stopped before reaching its last statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit<I> {
    Failed(RuntimeError),
    Interrupted(I),
}

/// Outcome of a single host call or expression that did not produce a value.
///
/// Errors carry only a message; the interpreter attaches the line of the
/// statement being executed when it turns them into an [`Exit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow<I> {
    Error(String),
    Interrupt(I),
}

impl<I> From<String> for Flow<I> {
    fn from(message: String) -> Self {
        Self::Error(message)
    }
}

impl<I> Flow<I> {
    pub(crate) fn at_line(self, line: usize) -> Exit<I> {
        match self {
            Self::Error(message) => Exit::Failed(RuntimeError { message, line }),
            Self::Interrupt(interrupt) => Exit::Interrupted(interrupt),
        }
    }
}
