// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Actor owning the ingress buffer of one stream.
//!
//! Producers hold cloneable [`LogStreamHandle`]s and send commands over an
//! unbounded channel; the [`LogStreamService`] task applies them one at a time,
//! so the buffer and its deadline need no locks. Drained batches are handed to
//! the flush worker, which leaves the service free to keep accepting writes
//! while a cycle is running.
//!
//! ```rust,ignore
//! let (service, handle, mut errors) = LogStreamService::new(&config, api);
//! tokio::spawn(service.run());
//!
//! handle.write(json!({"time": "2024-01-01T00:00:00Z", "v": 0, "msg": "hi"}))?;
//!
//! tokio::spawn(async move {
//!     while let Some(e) = errors.recv().await {
//!         eprintln!("log batch lost: {e}");
//!     }
//! });
//! ```

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error};

use crate::api::LogStreamApi;
use crate::buffer::IngressBuffer;
use crate::cloudwatch::CloudWatchLogsApi;
use crate::config::LogStreamConfig;
use crate::errors::{ConfigError, FlushError, WriteError};
use crate::flusher::{run_flush_worker, FlushJob, LogsFlusher};
use crate::log_event::{into_record, Record};

/// Receiving end of the asynchronous error notifications, one per failed cycle.
///
/// Errors are dropped if nobody holds this receiver.
pub type FlushErrors = mpsc::UnboundedReceiver<FlushError>;

#[derive(Debug)]
pub enum StreamCommand {
    Write(Record),
    /// Drain pending records and reply once they have been flushed.
    Flush(oneshot::Sender<()>),
    /// Drain, wait for the flush worker to finish, then stop.
    Shutdown(oneshot::Sender<()>),
}

#[derive(Clone, Debug)]
pub struct LogStreamHandle {
    tx: mpsc::UnboundedSender<StreamCommand>,
}

impl LogStreamHandle {
    /// Queues `record` for shipping. Never blocks.
    ///
    /// Fails only when `record` is not a JSON object or the service has stopped.
    /// Delivery failures are reported on [`FlushErrors`], not here.
    pub fn write(&self, record: Value) -> Result<(), WriteError> {
        let record = into_record(record)?;
        self.tx
            .send(StreamCommand::Write(record))
            .map_err(|_| WriteError::Closed)
    }

    /// Flushes everything written so far and waits for that cycle to finish.
    pub async fn flush(&self) -> Result<(), WriteError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(StreamCommand::Flush(done_tx))
            .map_err(|_| WriteError::Closed)?;
        done_rx.await.map_err(|_| WriteError::Closed)
    }

    /// Flushes pending records and stops the service.
    pub async fn shutdown(&self) -> Result<(), WriteError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(StreamCommand::Shutdown(done_tx))
            .map_err(|_| WriteError::Closed)?;
        done_rx.await.map_err(|_| WriteError::Closed)
    }
}

pub struct LogStreamService {
    buffer: IngressBuffer,
    flusher: LogsFlusher,
    rx: mpsc::UnboundedReceiver<StreamCommand>,
    errors_tx: mpsc::UnboundedSender<FlushError>,
}

enum Wakeup {
    Command(Option<StreamCommand>),
    Deadline,
}

impl LogStreamService {
    /// Creates the service, its handle and the error receiver.
    ///
    /// The service does nothing until [`LogStreamService::run`] is spawned.
    #[must_use]
    pub fn new(
        config: &LogStreamConfig,
        api: Arc<dyn LogStreamApi>,
    ) -> (Self, LogStreamHandle, FlushErrors) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();

        let service = Self {
            buffer: IngressBuffer::new(config.buffer_length, config.flush_timeout),
            flusher: LogsFlusher::new(api, config.stream_id()),
            rx,
            errors_tx,
        };

        (service, LogStreamHandle { tx }, errors_rx)
    }

    /// Validates `config` and connects to CloudWatch Logs with the ambient AWS credentials.
    pub async fn from_config(
        config: &LogStreamConfig,
    ) -> Result<(Self, LogStreamHandle, FlushErrors), ConfigError> {
        config.validate()?;
        let api = CloudWatchLogsApi::from_config(config).await;
        Ok(Self::new(config, Arc::new(api)))
    }

    /// Processes commands until shutdown or until every handle is dropped.
    ///
    /// Pending records are flushed before returning in both cases.
    pub async fn run(mut self) {
        debug!("LOGS | Stream service started");

        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_flush_worker(
            self.flusher.clone(),
            jobs_rx,
            self.errors_tx.clone(),
        ));

        // Flush and shutdown requesters answered once the worker has finished
        let mut replies: Vec<oneshot::Sender<()>> = Vec::new();

        loop {
            let wakeup = match self.buffer.deadline() {
                Some(deadline) => tokio::select! {
                    command = self.rx.recv() => Wakeup::Command(command),
                    () = sleep_until(deadline) => Wakeup::Deadline,
                },
                None => Wakeup::Command(self.rx.recv().await),
            };

            match wakeup {
                Wakeup::Deadline => {
                    let batch = self.buffer.take_batch();
                    dispatch(&jobs_tx, batch);
                }
                Wakeup::Command(Some(StreamCommand::Write(record))) => {
                    if let Some(batch) = self.buffer.push(record, Instant::now()) {
                        dispatch(&jobs_tx, batch);
                    }
                }
                Wakeup::Command(Some(StreamCommand::Flush(done))) => {
                    let batch = self.buffer.take_batch();
                    dispatch(&jobs_tx, batch);
                    if jobs_tx.send(FlushJob::Barrier(done)).is_err() {
                        error!("LOGS | Flush worker is gone, cannot acknowledge flush");
                    }
                }
                Wakeup::Command(Some(StreamCommand::Shutdown(done))) => {
                    debug!("LOGS | Stream service shutting down");
                    replies.push(done);
                    break;
                }
                Wakeup::Command(None) => {
                    debug!("LOGS | All stream handles dropped");
                    break;
                }
            }
        }

        // Writes from here on fail with `Closed`; the ones already queued
        // still make it into the final batch
        self.rx.close();
        while let Ok(command) = self.rx.try_recv() {
            match command {
                StreamCommand::Write(record) => {
                    if let Some(batch) = self.buffer.push(record, Instant::now()) {
                        dispatch(&jobs_tx, batch);
                    }
                }
                StreamCommand::Flush(done) | StreamCommand::Shutdown(done) => replies.push(done),
            }
        }

        let batch = self.buffer.take_batch();
        dispatch(&jobs_tx, batch);
        drop(jobs_tx);

        if let Err(e) = worker.await {
            error!("LOGS | Flush worker failed: {e}");
        }

        for done in replies {
            // The requester may have stopped waiting; nothing left to tell it
            let _ = done.send(());
        }

        debug!("LOGS | Stream service stopped");
    }
}

fn dispatch(jobs: &mpsc::UnboundedSender<FlushJob>, batch: Vec<Record>) {
    if batch.is_empty() {
        return;
    }
    let count = batch.len();
    if jobs.send(FlushJob::Cycle(batch)).is_err() {
        error!("LOGS | Flush worker is gone, dropping {count} records");
    }
}
