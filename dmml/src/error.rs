use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Where in the token stream a mapping file stopped making sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPosition {
    /// 1-based token index.
    Token(usize),
    EndOfInput,
}

impl fmt::Display for TokenPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenPosition::Token(index) => write!(f, "token {index}"),
            TokenPosition::EndOfInput => f.write_str("end of input"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DmmlError {
    #[error("DMML file not found: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid mapping file at {position}: {reason}")]
    InvalidMappingFile {
        reason: String,
        position: TokenPosition,
    },
}

impl DmmlError {
    pub fn is_invalid_mapping(&self) -> bool {
        matches!(self, DmmlError::InvalidMappingFile { .. })
    }

    pub fn is_file_not_found(&self) -> bool {
        matches!(self, DmmlError::FileNotFound { .. })
    }
}
