use thiserror::Error;

/// Result type alias for container and transfer operations
pub type Result<T> = std::result::Result<T, DiskArcError>;

/// Errors that can occur when working with disk images and archives
#[derive(Debug, Error)]
pub enum DiskArcError {
    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Destination cannot be modified
    #[error("Target is read-only{}", damage_note(.damaged))]
    ReadOnly {
        /// Read-only state stems from detected media damage
        damaged: bool,
    },

    /// An entry that must be a directory is not one
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// An incoming directory collides with an existing file
    #[error("Cannot replace non-directory '{0}' with directory")]
    DirectoryReplace(String),

    /// An incoming file collides with an existing directory
    #[error("Cannot replace directory '{0}' with non-directory")]
    FileReplace(String),

    /// Existing entry is damaged and must not be overwritten
    #[error("Cannot overwrite damaged file: {0}")]
    DamagedEntry(String),

    /// Stream generator had nothing for a part
    #[error("Unable to open source stream: {0}")]
    SourceUnavailable(String),

    /// File not found in container
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Entry handle does not refer to a live entry
    #[error("Invalid entry reference: #{0}")]
    InvalidEntry(usize),

    /// Invalid filename
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    /// Operation not supported by this container
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Volume is full, no free space
    #[error("Disk full: no free space available")]
    DiskFull,

    /// Container-specific error
    #[error("Container error: {0}")]
    ContainerError(String),

    /// Parse error at specific offset
    #[error("Parse error at offset {offset}: {message}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Error message
        message: String,
    },
}

fn damage_note(damaged: &bool) -> &'static str {
    if *damaged {
        " (damage)"
    } else {
        ""
    }
}

impl DiskArcError {
    /// Create a parse error with context
    pub fn parse<S: Into<String>>(offset: usize, message: S) -> Self {
        DiskArcError::ParseError {
            offset,
            message: message.into(),
        }
    }

    /// Create a container error
    pub fn container<S: Into<String>>(message: S) -> Self {
        DiskArcError::ContainerError(message.into())
    }

    /// Create an unsupported-operation error
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        DiskArcError::Unsupported(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_display() {
        assert_eq!(
            DiskArcError::ReadOnly { damaged: false }.to_string(),
            "Target is read-only"
        );
        assert_eq!(
            DiskArcError::ReadOnly { damaged: true }.to_string(),
            "Target is read-only (damage)"
        );
    }

    #[test]
    fn test_parse_error() {
        let err = DiskArcError::parse(26, "Bad entry count");
        assert_eq!(err.to_string(), "Parse error at offset 26: Bad entry count");
    }

    #[test]
    fn test_replace_messages() {
        let err = DiskArcError::FileReplace("SUBDIR".to_string());
        assert_eq!(
            err.to_string(),
            "Cannot replace directory 'SUBDIR' with non-directory"
        );
    }
}
