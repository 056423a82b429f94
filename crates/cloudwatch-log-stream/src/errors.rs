// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors returned synchronously by [`crate::LogStreamHandle`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// The record is not a JSON object. Only structured records can be shipped.
    #[error("log records must be JSON objects, got {0}")]
    InvalidRecordKind(&'static str),

    #[error("log stream service is not running")]
    Closed,
}

/// Error reported by the remote log-stream service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Service error code, e.g. `ThrottlingException`.
    pub code: String,
    pub message: String,
    /// Whether the service marked the failure as transient.
    pub retryable: bool,
    /// Token the service expected, when it rejected the one that was sent.
    pub expected_sequence_token: Option<String>,
}

impl ApiError {
    pub fn retryable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: true,
            expected_sequence_token: None,
        }
    }

    pub fn fatal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: false,
            expected_sequence_token: None,
        }
    }

    #[must_use]
    pub fn with_expected_sequence_token(mut self, token: Option<String>) -> Self {
        self.expected_sequence_token = token;
        self
    }
}

/// Terminal failure of one flush cycle. The cycle's batch has been dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlushError {
    #[error("failed to acquire sequence token: {0}")]
    TokenAcquisition(ApiError),

    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted { attempts: u32, source: ApiError },

    #[error("log events rejected: {0}")]
    Rejected(ApiError),
}

impl FlushError {
    /// The remote error that ended the cycle.
    #[must_use]
    pub fn api_error(&self) -> &ApiError {
        match self {
            Self::TokenAcquisition(e) | Self::Rejected(e) => e,
            Self::RetriesExhausted { source, .. } => source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing log group name")]
    MissingLogGroup,

    #[error("Missing log stream name")]
    MissingLogStream,
}
