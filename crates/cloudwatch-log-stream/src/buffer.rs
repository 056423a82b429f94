// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pending records and the size/time flush triggers.
//!
//! Two independent triggers bound the latency of a record:
//! - **Length**: reaching `buffer_length` pending records drains them at once.
//! - **Time**: the first record pushed while no deadline is armed arms one
//!   `flush_timeout` ahead. The owner drains the buffer when it passes.
//!
//! A length drain arms a fresh deadline right away, so it may be followed by
//! a timer drain of whatever arrived in between. That drain may be empty.

use std::time::Duration;
use tokio::time::Instant;

use crate::log_event::Record;

#[derive(Debug)]
pub struct IngressBuffer {
    /// Records in insertion order. Remote ordering depends on it.
    pending: Vec<Record>,
    buffer_length: usize,
    flush_timeout: Duration,
    deadline: Option<Instant>,
}

impl IngressBuffer {
    #[must_use]
    pub fn new(buffer_length: usize, flush_timeout: Duration) -> Self {
        IngressBuffer {
            pending: Vec::with_capacity(buffer_length),
            buffer_length,
            flush_timeout,
            deadline: None,
        }
    }

    /// Appends `record` and evaluates the triggers.
    ///
    /// Returns the drained batch when the length trigger fired.
    pub fn push(&mut self, record: Record, now: Instant) -> Option<Vec<Record>> {
        self.pending.push(record);
        self.check_buffer(now)
    }

    fn check_buffer(&mut self, now: Instant) -> Option<Vec<Record>> {
        if self.pending.is_empty() {
            return None;
        }

        let batch = if self.pending.len() >= self.buffer_length {
            Some(self.take_batch())
        } else {
            None
        };

        if self.deadline.is_none() {
            self.deadline = Some(now + self.flush_timeout);
        }

        batch
    }

    /// Swaps the pending records for an empty sequence and disarms the deadline.
    pub fn take_batch(&mut self) -> Vec<Record> {
        self.deadline = None;
        std::mem::replace(&mut self.pending, Vec::with_capacity(self.buffer_length))
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
