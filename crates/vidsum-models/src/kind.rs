//! Error-kind taxonomy shared by the facade envelope and job records.

use serde::{Deserialize, Serialize};

/// Reason recorded by the startup sweep for jobs a previous process
/// lifetime left non-terminal.
pub const INTERRUPTED: &str = "interrupted";

/// Abstract error taxonomy carried in the error envelope `code` field and
/// in failed job/entry reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    UnsupportedType,
    TooLarge,
    Timeout,
    TooManyRequests,
    Upstream,
    Cancelled,
    Interrupted,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::NotFound => "not-found",
            ErrorKind::UnsupportedType => "unsupported-type",
            ErrorKind::TooLarge => "too-large",
            ErrorKind::Timeout => "timeout",
            ErrorKind::TooManyRequests => "too-many-requests",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::InvalidArgument).unwrap(),
            "\"invalid-argument\""
        );
        assert_eq!(ErrorKind::Interrupted.as_str(), INTERRUPTED);
    }
}
