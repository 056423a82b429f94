// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Submission of one batch of events with bounded, fixed-delay retry.
//!
//! Every put consumes the cached sequence token, so two puts racing on the
//! same token can never both succeed. An in-flight guard shared by all clones
//! of a [`Submitter`] keeps at most one put outstanding per stream; a caller
//! that finds it taken waits [`SUBMIT_DEFER_DELAY`] and checks again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::api::{LogStreamApi, RejectedLogEvents, StreamId};
use crate::constants::{MAX_SUBMIT_RETRIES, SUBMIT_DEFER_DELAY, SUBMIT_RETRY_DELAY};
use crate::errors::FlushError;
use crate::log_event::LogEvent;
use crate::token::TokenManager;

#[derive(Clone)]
pub struct Submitter {
    api: Arc<dyn LogStreamApi>,
    stream: Arc<StreamId>,
    tokens: TokenManager,
    in_flight: Arc<AtomicBool>,
}

/// Releases the in-flight flag when the submission ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Submitter {
    #[must_use]
    pub fn new(api: Arc<dyn LogStreamApi>, stream: Arc<StreamId>, tokens: TokenManager) -> Self {
        Submitter {
            api,
            stream,
            tokens,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Puts `events` using the cached token, retrying transient failures.
    ///
    /// On success the cached token is replaced by the one the service returns.
    pub async fn post_log_events(&self, events: &[LogEvent]) -> Result<(), FlushError> {
        let _guard = self.acquire().await;

        let mut retries: u32 = 0;
        let mut expected_token: Option<String> = None;

        loop {
            // A token the service named in a rejection beats the cached one
            // for the rest of the cycle
            let sequence_token = match &expected_token {
                Some(token) => Some(token.clone()),
                None => self.tokens.current().await,
            };

            match self
                .api
                .put_log_events(&self.stream, sequence_token, events)
                .await
            {
                Ok(output) => {
                    if let Some(rejected) = &output.rejected_log_events {
                        report_rejected(rejected);
                    }
                    self.tokens.advance(output.next_sequence_token).await;
                    debug!(
                        "LOGS | Put {} events to {} after {} retries",
                        events.len(),
                        self.stream,
                        retries
                    );
                    return Ok(());
                }
                Err(e) if e.retryable => {
                    if retries >= MAX_SUBMIT_RETRIES {
                        error!(
                            "LOGS | Failed to put events to {} after {} attempts: {}",
                            self.stream,
                            retries + 1,
                            e
                        );
                        return Err(FlushError::RetriesExhausted {
                            attempts: retries + 1,
                            source: e,
                        });
                    }
                    retries += 1;
                    warn!(
                        "LOGS | Retryable error putting events to {} (retry {}/{}): {}",
                        self.stream, retries, MAX_SUBMIT_RETRIES, e
                    );
                    if let Some(token) = e.expected_sequence_token {
                        expected_token = Some(token);
                    }
                    sleep(SUBMIT_RETRY_DELAY).await;
                }
                Err(e) => {
                    error!("LOGS | Events rejected by {}: {}", self.stream, e);
                    return Err(FlushError::Rejected(e));
                }
            }
        }
    }

    /// True while a put is outstanding for this stream.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    async fn acquire(&self) -> InFlightGuard<'_> {
        loop {
            if self
                .in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return InFlightGuard(&self.in_flight);
            }
            debug!(
                "LOGS | Submission to {} already in flight, deferring",
                self.stream
            );
            sleep(SUBMIT_DEFER_DELAY).await;
        }
    }
}

fn report_rejected(rejected: &RejectedLogEvents) {
    if let Some(index) = rejected.too_new_start_index {
        warn!("LOGS | Events from index {index} were rejected as too new");
    }
    if let Some(index) = rejected.too_old_end_index {
        warn!("LOGS | Events up to index {index} were rejected as too old");
    }
    if let Some(index) = rejected.expired_end_index {
        warn!("LOGS | Events up to index {index} were rejected as expired");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{PutLogEventsOutput, StreamDescription};
    use crate::errors::ApiError;
    use async_trait::async_trait;
    use tracing_test::traced_test;

    /// Accepts every put but flags part of the batch as out of range.
    struct PartialRejectApi;

    #[async_trait]
    impl LogStreamApi for PartialRejectApi {
        async fn describe_stream(
            &self,
            _stream: &StreamId,
        ) -> Result<Option<StreamDescription>, ApiError> {
            Ok(Some(StreamDescription::default()))
        }

        async fn create_stream(&self, _stream: &StreamId) -> Result<(), ApiError> {
            Ok(())
        }

        async fn put_log_events(
            &self,
            _stream: &StreamId,
            _sequence_token: Option<String>,
            _events: &[LogEvent],
        ) -> Result<PutLogEventsOutput, ApiError> {
            Ok(PutLogEventsOutput {
                next_sequence_token: Some("next".to_string()),
                rejected_log_events: Some(RejectedLogEvents {
                    too_old_end_index: Some(1),
                    ..Default::default()
                }),
            })
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_partial_rejection_is_reported_and_token_advanced() {
        let api: Arc<dyn LogStreamApi> = Arc::new(PartialRejectApi);
        let stream = Arc::new(StreamId::new("group", "stream"));
        let tokens = TokenManager::new(Arc::clone(&api), Arc::clone(&stream));
        let submitter = Submitter::new(api, stream, tokens.clone());

        let events = vec![
            LogEvent {
                message: "{}".to_string(),
                timestamp: 1,
            };
            3
        ];
        assert_eq!(submitter.post_log_events(&events).await, Ok(()));

        assert_eq!(tokens.current().await, Some("next".to_string()));
        assert!(!submitter.is_in_flight());
        assert!(logs_contain("Events up to index 1 were rejected as too old"));
    }
}
