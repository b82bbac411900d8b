use std::fmt;

use thiserror::Error;

/// 1-based line/column position in template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Compute the line/column of a byte offset. Offsets past the end of
    /// the source clamp to the final position.
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let mut line = 1;
        let mut column = 1;
        for c in source[..offset].chars() {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// All failures the engine can report. Each variant is one failure class;
/// the CLI maps them to distinct exit codes via [`Error::exit_code`].
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed template, detected before any evaluation.
    #[error("syntax error at {location}: {message}")]
    Syntax { message: String, location: Location },

    /// Malformed or inaccessible input data.
    #[error("data error: {message}")]
    Data { message: String },

    /// Failure while evaluating a well-formed template against bound data.
    #[error("render error: {message}")]
    Render { message: String },
}

impl Error {
    pub(crate) fn syntax(message: impl Into<String>, location: Location) -> Self {
        Error::Syntax {
            message: message.into(),
            location,
        }
    }

    pub(crate) fn data(message: impl Into<String>) -> Self {
        Error::Data {
            message: message.into(),
        }
    }

    pub(crate) fn render(message: impl Into<String>) -> Self {
        Error::Render {
            message: message.into(),
        }
    }

    /// Process exit code for this failure class. 1 and 2 are left to the
    /// CLI for IO and usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Syntax { .. } => 3,
            Error::Data { .. } => 4,
            Error::Render { .. } => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
