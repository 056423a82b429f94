// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The remote log-stream operations the shipper depends on.

use async_trait::async_trait;

use crate::errors::ApiError;
use crate::log_event::LogEvent;

/// Identity of the remote stream a service ships to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId {
    pub log_group_name: String,
    pub log_stream_name: String,
}

impl StreamId {
    pub fn new(log_group_name: impl Into<String>, log_stream_name: impl Into<String>) -> Self {
        Self {
            log_group_name: log_group_name.into(),
            log_stream_name: log_stream_name.into(),
        }
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.log_group_name, self.log_stream_name)
    }
}

/// Metadata of an existing stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDescription {
    /// Token to present on the next put. Absent for a stream never written to.
    pub upload_sequence_token: Option<String>,
}

/// Indexes of events the service refused within an otherwise accepted put.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectedLogEvents {
    pub too_new_start_index: Option<i32>,
    pub too_old_end_index: Option<i32>,
    pub expired_end_index: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutLogEventsOutput {
    pub next_sequence_token: Option<String>,
    pub rejected_log_events: Option<RejectedLogEvents>,
}

#[async_trait]
pub trait LogStreamApi: Send + Sync {
    /// Looks up `stream`. Returns `Ok(None)` when the group has no stream of that name.
    async fn describe_stream(&self, stream: &StreamId)
        -> Result<Option<StreamDescription>, ApiError>;

    /// Creates `stream`. Must succeed when the stream already exists.
    async fn create_stream(&self, stream: &StreamId) -> Result<(), ApiError>;

    async fn put_log_events(
        &self,
        stream: &StreamId,
        sequence_token: Option<String>,
        events: &[LogEvent],
    ) -> Result<PutLogEventsOutput, ApiError>;
}
