//! Error classification shared by retry and redelivery decisions.

use serde::{Deserialize, Serialize};

/// Whether a failure is worth trying again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Infrastructure trouble (timeouts, lost connections). Retry or redeliver.
    Transient,
    /// Business rule violation or malformed input. Never retried.
    Permanent,
}

impl ErrorKind {
    /// Returns true for [`ErrorKind::Transient`].
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that know their own [`ErrorKind`].
pub trait Classify {
    /// Returns the classification of this error.
    fn kind(&self) -> ErrorKind;

    /// Shorthand for `self.kind().is_transient()`.
    fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky;

    impl Classify for Flaky {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Transient
        }
    }

    #[test]
    fn test_is_transient() {
        assert!(ErrorKind::Transient.is_transient());
        assert!(!ErrorKind::Permanent.is_transient());
        assert!(Flaky.is_transient());
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorKind::Transient.to_string(), "transient");
        assert_eq!(ErrorKind::Permanent.to_string(), "permanent");
    }
}
