use thiserror::Error;

use crate::value::Value;

/// One compile-time diagnostic run aborted with at least one error; the
/// diagnostics themselves were already emitted through a `Reporter`.
#[derive(Debug, Error)]
#[error("compilation failed")]
pub struct CompileError;

#[derive(Debug, Clone)]
pub struct BacktraceFrame {
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Default, Clone)]
pub struct Backtrace(pub Vec<BacktraceFrame>);

impl std::fmt::Display for Backtrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for frame in self.0.iter().rev() {
            writeln!(f, "  at {} (line {})", frame.name, frame.line)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("{message}\n{backtrace}")]
pub struct RuntimeError {
    pub message: String,
    pub value: Option<Value>,
    pub backtrace: Backtrace,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, backtrace: Backtrace) -> Self {
        Self {
            message: message.into(),
            value: None,
            backtrace,
        }
    }

    /// Like `new`, but carries the offending value along with the message
    /// for callers that already have it in hand (type mismatches, calls on
    /// a non-callable).
    pub fn with_value(message: impl Into<String>, value: Value, backtrace: Backtrace) -> Self {
        Self {
            message: message.into(),
            value: Some(value),
            backtrace,
        }
    }
}

#[derive(Debug, Error)]
pub enum StingError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("{0}")]
    Io(String),
}

impl StingError {
    /// Exit code contract from the CLI section: 0 ok, 1 compile error,
    /// 2 runtime error, 70 (EX_SOFTWARE) anything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Compile(_) => 1,
            Self::Runtime(_) => 2,
            Self::Io(_) => exitcode::IOERR,
        }
    }
}
