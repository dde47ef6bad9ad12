//! Error types for payload loading

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for payload operations
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Errors raised while ingesting payload sources.
///
/// Every variant aborts only the file it names. Records inserted before the
/// failure stay in the registry.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// Template or capture file could not be opened
    #[error("payloads: can't read from file '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed template record
    #[error("{file}:{line}: {message}")]
    Syntax {
        file: String,
        line: usize,
        message: String,
    },

    /// I/O failure after the file was opened
    #[error("{file}: read error: {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// Capture file header is not a readable pcap header
    #[error("{file}: bad packet capture: {source}")]
    Capture {
        file: String,
        #[source]
        source: pcap_file::PcapError,
    },
}

impl PayloadError {
    /// Create a syntax error located at `file:line`
    pub fn syntax<F: Into<String>, M: Into<String>>(file: F, line: usize, message: M) -> Self {
        PayloadError::Syntax {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Check if this is a syntax error
    pub fn is_syntax(&self) -> bool {
        matches!(self, PayloadError::Syntax { .. })
    }
}
