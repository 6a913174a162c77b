//! Error taxonomy for the export pipeline.
//!
//! Per-field conversion problems never surface here: the encoders degrade
//! them to null/empty values so a single bad attribute cannot drop a batch.
//! What can fail a push is encoding the finished batch or delivering it, and
//! the caller needs to know which signal (and for metrics, which measurement
//! groups) to resend.

use reqwest::StatusCode;
use thiserror::Error;

/// The telemetry signal a failed push was carrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Traces,
    Metrics,
    Logs,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Traces => write!(f, "traces"),
            Signal::Metrics => write!(f, "metrics"),
            Signal::Logs => write!(f, "logs"),
        }
    }
}

/// Failure delivering one payload to the Arc write endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Arc answered with a non-success status.
    #[error("arc returned status {status}: {message}")]
    Status { status: StatusCode, message: String },
    /// The request never produced a response (connect, timeout, TLS, ...).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl TransportError {
    /// Whether the hosting retry layer should resend the same batch.
    ///
    /// 5xx and network/timeout failures are transient; 4xx means the payload
    /// or request itself is wrong and retrying cannot help.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Status { status, .. } => status.is_server_error(),
            TransportError::Request(_) => true,
        }
    }
}

/// One metric measurement group that failed to flush.
#[derive(Debug)]
pub struct MeasurementFailure {
    /// Sanitized metric name the group was routed to.
    pub measurement: String,
    pub error: ExportError,
}

/// Error returned by a push. Identifies the signal so a retrying caller can
/// resend the same logical batch.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode {signal} batch: {source}")]
    Encode {
        signal: Signal,
        source: crate::payload::PayloadError,
    },
    #[error("failed to send {signal} batch: {source}")]
    Transport {
        signal: Signal,
        source: TransportError,
    },
    /// Metrics are flushed one measurement group at a time; groups that
    /// succeeded are done, the listed ones need retry.
    #[error("{} metric measurement group(s) failed to flush", failures.len())]
    PartialMetricsFlush { failures: Vec<MeasurementFailure> },
}

impl ExportError {
    /// Whether any part of the failed push is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExportError::Encode { .. } => false,
            ExportError::Transport { source, .. } => source.is_retryable(),
            ExportError::PartialMetricsFlush { failures } => {
                failures.iter().any(|f| f.error.is_retryable())
            }
        }
    }
}
