// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Flush cycles: token acquisition followed by submission.
//!
//! Drained batches are queued to a single worker task, so cycles run strictly
//! in the order they were started and cycle N, retries included, is finished
//! before cycle N+1 reads the cached token.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::api::{LogStreamApi, StreamId};
use crate::errors::FlushError;
use crate::log_event::{build_log_event, LogEvent, Record};
use crate::submitter::Submitter;
use crate::token::TokenManager;

#[derive(Clone)]
pub struct LogsFlusher {
    tokens: TokenManager,
    submitter: Submitter,
}

impl LogsFlusher {
    #[must_use]
    pub fn new(api: Arc<dyn LogStreamApi>, stream: StreamId) -> Self {
        let stream = Arc::new(stream);
        let tokens = TokenManager::new(Arc::clone(&api), Arc::clone(&stream));
        let submitter = Submitter::new(api, stream, tokens.clone());
        LogsFlusher { tokens, submitter }
    }

    /// Runs one flush cycle for `records`. An empty batch is a no-op.
    pub async fn flush(&self, records: Vec<Record>) -> Result<(), FlushError> {
        if records.is_empty() {
            return Ok(());
        }

        self.tokens
            .get_token()
            .await
            .map_err(FlushError::TokenAcquisition)?;

        let events: Vec<LogEvent> = records.iter().map(build_log_event).collect();
        self.submitter.post_log_events(&events).await
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }
}

#[derive(Debug)]
pub(crate) enum FlushJob {
    Cycle(Vec<Record>),
    /// Acknowledged once every cycle queued before it has finished.
    Barrier(oneshot::Sender<()>),
}

/// Runs queued cycles one at a time until the job channel closes.
pub(crate) async fn run_flush_worker(
    flusher: LogsFlusher,
    mut jobs: mpsc::UnboundedReceiver<FlushJob>,
    errors: mpsc::UnboundedSender<FlushError>,
) {
    debug!("LOGS | Flush worker started");

    while let Some(job) = jobs.recv().await {
        match job {
            FlushJob::Cycle(records) => {
                let count = records.len();
                match flusher.flush(records).await {
                    Ok(()) => debug!("LOGS | Flushed {count} records"),
                    Err(e) => {
                        error!("LOGS | Dropping {count} records: {e}");
                        if errors.send(e).is_err() {
                            debug!("LOGS | No subscriber for flush errors");
                        }
                    }
                }
            }
            FlushJob::Barrier(done) => {
                if done.send(()).is_err() {
                    debug!("LOGS | Flush requester went away before completion");
                }
            }
        }
    }

    debug!("LOGS | Flush worker stopped");
}
