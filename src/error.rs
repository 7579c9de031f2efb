use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestrsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Parse error at position {position}: {message}")]
    Parse { message: String, position: usize },

    /// A single report file could not be parsed; fatal for the whole run.
    #[error("Failed to parse the Surefire report {}: {source}", .path.display())]
    Report {
        path: PathBuf,
        source: Box<TestrsError>,
    },

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Test detail error: {0}")]
    Detail(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TestrsError>;
