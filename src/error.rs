use std::fmt::Display;

use thiserror::Error;
use tracing::debug;

use crate::normalize::NormalizeError;

const QUOTA_MESSAGE: &str = "Daily API quota exceeded (the free tier allows 20 requests/day). \
Please try again tomorrow or use a different API key from https://aistudio.google.com/apikey";
const CREDENTIAL_MESSAGE: &str =
    "Invalid or missing Gemini API key. Set GEMINI_API_KEY or point api_key_env at your key.";
const RATE_LIMIT_MESSAGE: &str = "Too many requests. Please wait a moment and try again.";
const FORBIDDEN_MESSAGE: &str =
    "API access forbidden. Check if your API key has the necessary permissions.";
const BLOCKED_MESSAGE: &str = "Content was blocked by safety filters. Try different material.";
const MALFORMED_MESSAGE: &str =
    "The model returned data in an unexpected format. Please try again.";
const FALLBACK_MESSAGE: &str = "Failed to get a response from the model. Please try again.";

/// Closed set of failure kinds surfaced to callers. Callers branch on this,
/// never on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingCredential,
    QuotaExceeded,
    RateLimited,
    ContentBlocked,
    Forbidden,
    MalformedOutput,
    EmptyInput,
    EmptyOutput,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn empty_input(what: impl Display) -> Self {
        Self::new(
            ErrorKind::EmptyInput,
            format!("{what} is too short. Please provide more content."),
        )
    }

    pub(crate) fn missing_credential() -> Self {
        Self::new(ErrorKind::MissingCredential, CREDENTIAL_MESSAGE)
    }
}

/// Provider-level failure as reported by the completion oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OracleError {
    pub status: Option<u16>,
    pub message: String,
}

impl OracleError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// A failure that has not been classified yet.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl Failure {
    fn status(&self) -> Option<u16> {
        match self {
            Self::Oracle(err) => err.status,
            Self::Normalize(_) => None,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Oracle(err) => &err.message,
            Self::Normalize(_) => "",
        }
    }
}

/// Maps a raw failure to exactly one [`ClassifiedError`]. First match wins.
pub fn classify(failure: &Failure) -> ClassifiedError {
    let status = failure.status();
    let message = failure.message().to_lowercase();

    let classified = if message.contains("api key") {
        ClassifiedError::missing_credential()
    } else if status == Some(429) || message.contains("quota") || message.contains("429") {
        ClassifiedError::new(ErrorKind::QuotaExceeded, QUOTA_MESSAGE)
    } else if status == Some(403) || message.contains("forbidden") {
        ClassifiedError::new(ErrorKind::Forbidden, FORBIDDEN_MESSAGE)
    } else if message.contains("blocked") {
        ClassifiedError::new(ErrorKind::ContentBlocked, BLOCKED_MESSAGE)
    } else if message.contains("rate limit") || message.contains("too many requests") {
        ClassifiedError::new(ErrorKind::RateLimited, RATE_LIMIT_MESSAGE)
    } else if matches!(failure, Failure::Normalize(_)) {
        ClassifiedError::new(ErrorKind::MalformedOutput, MALFORMED_MESSAGE)
    } else {
        let raw = failure.message().trim();
        let message = if raw.is_empty() { FALLBACK_MESSAGE } else { raw };
        ClassifiedError::new(ErrorKind::Unknown, message)
    };
    debug!(kind = ?classified.kind, %failure, "classified failure");
    classified
}

impl From<OracleError> for ClassifiedError {
    fn from(value: OracleError) -> Self {
        classify(&Failure::Oracle(value))
    }
}

impl From<NormalizeError> for ClassifiedError {
    fn from(value: NormalizeError) -> Self {
        classify(&Failure::Normalize(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, ClassifiedError, ErrorKind, Failure, OracleError};
    use crate::normalize::NormalizeError;

    fn oracle(status: Option<u16>, message: &str) -> ClassifiedError {
        classify(&Failure::Oracle(OracleError::new(status, message)))
    }

    #[test]
    fn credential_text_wins_over_status() {
        assert_eq!(
            oracle(Some(429), "API key invalid").kind,
            ErrorKind::MissingCredential
        );
    }

    #[test]
    fn quota_from_status_or_text() {
        assert_eq!(oracle(Some(429), "").kind, ErrorKind::QuotaExceeded);
        assert_eq!(
            oracle(None, "Resource has been exhausted (e.g. check QUOTA).").kind,
            ErrorKind::QuotaExceeded
        );
        let err = oracle(None, "[429 Too Many Requests]");
        assert_eq!(err.kind, ErrorKind::QuotaExceeded);
        assert!(err.message.contains("free tier"));
    }

    #[test]
    fn forbidden_and_blocked() {
        assert_eq!(oracle(Some(403), "denied").kind, ErrorKind::Forbidden);
        assert_eq!(oracle(None, "Forbidden resource").kind, ErrorKind::Forbidden);
        assert_eq!(
            oracle(Some(400), "Response was blocked due to SAFETY").kind,
            ErrorKind::ContentBlocked
        );
    }

    #[test]
    fn rate_limit_wording() {
        assert_eq!(
            oracle(Some(503), "rate limit reached, slow down").kind,
            ErrorKind::RateLimited
        );
    }

    #[test]
    fn normalizer_failures_are_malformed_output() {
        let err = classify(&Failure::Normalize(NormalizeError::NoArray));
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
        let err: ClassifiedError = NormalizeError::NoValidRecords { total: 3 }.into();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
    }

    #[test]
    fn unknown_passes_message_through() {
        let err = oracle(Some(500), "  connection reset by peer ");
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.message, "connection reset by peer");

        let err = oracle(None, "");
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(!err.message.is_empty());
    }
}
