// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Buffered shipping of structured log records to a CloudWatch Logs stream.
//!
//! Records are accepted one at a time through a [`LogStreamHandle`], buffered
//! in insertion order, and flushed as a batch either when the buffer reaches
//! its configured length or when the flush timeout elapses, whichever comes
//! first.
//!
//! ```text
//!   write(record)
//!        │
//!        v
//!   ┌──────────────┐   length / timeout    ┌──────────────┐
//!   │ Stream       │ ────────────────────> │ Flush worker │ (one cycle at a time)
//!   │ service      │      drained batch    └──────┬───────┘
//!   └──────────────┘                              │
//!                                                 v
//!                                   ┌──────────────────────────┐
//!                                   │ Token manager            │ describe / create stream
//!                                   └────────────┬─────────────┘
//!                                                v
//!                                   ┌──────────────────────────┐
//!                                   │ Submitter                │ put events, retry, advance token
//!                                   └──────────────────────────┘
//! ```
//!
//! Delivery is best effort: a batch whose cycle fails is reported once on the
//! [`FlushErrors`] channel and dropped.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod api;
pub mod buffer;
pub mod cloudwatch;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flusher;
pub mod log_event;
pub mod stream_service;
pub mod submitter;
pub mod token;

pub use api::{LogStreamApi, StreamId};
pub use config::LogStreamConfig;
pub use errors::{ApiError, ConfigError, FlushError, WriteError};
pub use stream_service::{FlushErrors, LogStreamHandle, LogStreamService};
