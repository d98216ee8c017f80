//! Error handling for kinematics, motion and automation

use std::io;

/// Unified error of the arm core. Every variant renders into a message that can be shown
/// to the operator as is.
#[derive(Debug)]
pub enum ArmError {
    /// Malformed or out-of-range input (point counts, workspace bounds, servo ranges).
    Validation(String),
    /// Index based access outside the collection.
    NotFound { index: usize, len: usize },
    /// The numeric inverse kinematics pass failed.
    Unreachable(String),
    /// The command sink reported failure.
    Transport(String),
    /// Stop was requested while the operation was in progress. Not a failure.
    Interrupted,
    IoError(io::Error),
    ParseError(String),
    /// A worker ended abnormally (panicked).
    Internal(String),
}

impl ArmError {
    /// True if the error only reports the cooperative stop.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ArmError::Interrupted)
    }
}

impl std::fmt::Display for ArmError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ArmError::Validation(ref msg) =>
                write!(f, "Invalid input: {}", msg),
            ArmError::NotFound { index, len } =>
                write!(f, "No point at index {} (have {})", index, len),
            ArmError::Unreachable(ref msg) =>
                write!(f, "Inverse kinematics failed: {}", msg),
            ArmError::Transport(ref msg) =>
                write!(f, "Command not delivered: {}", msg),
            ArmError::Interrupted =>
                write!(f, "Stopped by request"),
            ArmError::IoError(ref err) =>
                write!(f, "IO Error: {}", err),
            ArmError::ParseError(ref msg) =>
                write!(f, "Parse Error: {}", msg),
            ArmError::Internal(ref msg) =>
                write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ArmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArmError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ArmError {
    fn from(err: io::Error) -> Self {
        ArmError::IoError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_readable() {
        let err = ArmError::NotFound { index: 3, len: 2 };
        assert_eq!(err.to_string(), "No point at index 3 (have 2)");

        let err = ArmError::Transport("port closed".into());
        assert_eq!(err.to_string(), "Command not delivered: port closed");
        assert!(!err.is_interrupted());
        assert!(ArmError::Interrupted.is_interrupted());
    }
}
