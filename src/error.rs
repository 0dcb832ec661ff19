use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that end or downgrade an analysis run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("Unparsable document: {reason}")]
    UnparsableDocument { reason: String },

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl AnalysisError {
    pub fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientData { reason: reason.into() }
    }

    pub fn unparsable(reason: impl Into<String>) -> Self {
        Self::UnparsableDocument { reason: reason.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}

/// A signal detector could not read its input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("Malformed {field}: '{value}'")]
    Malformed { field: String, value: String },

    #[error("Detector panicked: {0}")]
    Panicked(String),
}

/// Failure of a single network probe
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Redirect loop detected")]
    RedirectLoop,

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_redirect() {
            FetchError::RedirectLoop
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    InsufficientData,
    PartialDetectorFailure,
    SignalUnknown,
    UnparsableDocument,
    ProbeTimeout,
    ProbeFailed,
    CapabilityUnavailable,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::InsufficientData => "insufficient_data",
            DiagnosticKind::PartialDetectorFailure => "partial_detector_failure",
            DiagnosticKind::SignalUnknown => "signal_unknown",
            DiagnosticKind::UnparsableDocument => "unparsable_document",
            DiagnosticKind::ProbeTimeout => "probe_timeout",
            DiagnosticKind::ProbeFailed => "probe_failed",
            DiagnosticKind::CapabilityUnavailable => "capability_unavailable",
        }
    }
}

/// Non-fatal note attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Component or detector that produced it
    pub source: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            message: message.into(),
        }
    }

    /// Lower a run-level error into a diagnostic entry
    pub fn from_error(source: impl Into<String>, err: &AnalysisError) -> Self {
        let kind = match err {
            AnalysisError::UnparsableDocument { .. } => DiagnosticKind::UnparsableDocument,
            _ => DiagnosticKind::InsufficientData,
        };
        Self::new(kind, source, err.to_string())
    }
}
