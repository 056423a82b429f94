// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Defaults and fixed limits for buffering and submission.

use std::time::Duration;

/// Number of pending records that triggers an immediate flush.
pub const DEFAULT_BUFFER_LENGTH: usize = 100;

/// Maximum time the first pending record waits before a flush is triggered.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(100);

/// Retries allowed after the first submission attempt of a cycle.
///
/// A cycle therefore makes at most `MAX_SUBMIT_RETRIES + 1` put calls before
/// surfacing the last retryable error.
pub const MAX_SUBMIT_RETRIES: u32 = 5;

/// Fixed pause between two attempts of the same submission.
pub const SUBMIT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Pause before re-checking the in-flight guard when another submission holds it.
pub const SUBMIT_DEFER_DELAY: Duration = Duration::from_millis(100);

/// Record field carrying the event time. Moved into the envelope timestamp.
pub const TIME_FIELD: &str = "time";

/// Record format version field. Dropped from the transmitted message.
pub const VERSION_FIELD: &str = "v";

/// Timestamp assigned to records whose `time` cannot be interpreted.
pub const INVALID_TIMESTAMP: i64 = 0;
