//! Error types shared by the reader, the sessions and the dispatcher

use thiserror::Error;

/// Classified failure raised while opening a workbook.
///
/// These are the expected failures: the run reports them on one line and
/// moves on to the next file.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Unsupported format, or corrupt file: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Malformed(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Engine(#[from] calamine::Error),
}

impl OpenError {
    /// Short name used as the classification prefix in failure lines
    pub fn kind(&self) -> &'static str {
        match self {
            OpenError::UnsupportedFormat(_) => "UnsupportedFormat",
            OpenError::Malformed(_) => "MalformedWorkbook",
            OpenError::NotImplemented(_) => "NotImplemented",
            OpenError::Io(_) => "IoError",
            OpenError::Engine(_) => "EngineError",
        }
    }

    /// One-line report printed when a file cannot be opened
    pub fn failure_line(&self) -> String {
        format!("*** Open failed: {}: {}", self.kind(), self)
    }
}

/// Failures detected while interpreting the command line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("*** Unknown command <{0}>")]
    UnknownCommand(String),

    #[error("Expected at least 2 args, found {0}")]
    MissingArguments(usize),
}
