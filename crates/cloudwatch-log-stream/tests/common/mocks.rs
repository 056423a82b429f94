// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Scripted in-memory log-stream service

#![allow(dead_code)]

use async_trait::async_trait;
use cloudwatch_log_stream::api::{
    LogStreamApi, PutLogEventsOutput, StreamDescription, StreamId,
};
use cloudwatch_log_stream::errors::ApiError;
use cloudwatch_log_stream::log_event::LogEvent;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// One recorded put call
#[derive(Debug, Clone)]
pub struct PutCall {
    pub sequence_token: Option<String>,
    pub events: Vec<LogEvent>,
    pub at: Instant,
}

impl PutCall {
    /// Messages of the submitted events, in order
    pub fn messages(&self) -> Vec<String> {
        self.events.iter().map(|e| e.message.clone()).collect()
    }
}

#[derive(Default)]
struct MockState {
    stream_exists: bool,
    upload_sequence_token: Option<String>,
    describe_error: Option<ApiError>,
    create_error: Option<ApiError>,
    put_results: VecDeque<Result<PutLogEventsOutput, ApiError>>,
    put_latency: Duration,
    describe_calls: usize,
    create_calls: usize,
    puts: Vec<PutCall>,
    in_flight: usize,
    max_in_flight: usize,
    issued_tokens: u64,
}

/// Put calls succeed with `token-1`, `token-2`, ... unless a result was scripted.
pub struct MockLogStreamApi {
    state: Mutex<MockState>,
}

impl MockLogStreamApi {
    pub fn existing_stream(upload_sequence_token: Option<&str>) -> Self {
        Self {
            state: Mutex::new(MockState {
                stream_exists: true,
                upload_sequence_token: upload_sequence_token.map(str::to_string),
                ..Default::default()
            }),
        }
    }

    pub fn missing_stream() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_describe_error(self, error: ApiError) -> Self {
        self.state.lock().unwrap().describe_error = Some(error);
        self
    }

    pub fn with_create_error(self, error: ApiError) -> Self {
        self.state.lock().unwrap().create_error = Some(error);
        self
    }

    pub fn with_put_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().put_latency = latency;
        self
    }

    /// Queues results returned by the next put calls, in order
    pub fn with_put_results(
        self,
        results: impl IntoIterator<Item = Result<PutLogEventsOutput, ApiError>>,
    ) -> Self {
        self.state.lock().unwrap().put_results.extend(results);
        self
    }

    pub fn puts(&self) -> Vec<PutCall> {
        self.state.lock().unwrap().puts.clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.state.lock().unwrap().describe_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    pub fn remaining_put_results(&self) -> usize {
        self.state.lock().unwrap().put_results.len()
    }
}

pub fn success(next_sequence_token: &str) -> Result<PutLogEventsOutput, ApiError> {
    Ok(PutLogEventsOutput {
        next_sequence_token: Some(next_sequence_token.to_string()),
        rejected_log_events: None,
    })
}

pub fn throttled() -> Result<PutLogEventsOutput, ApiError> {
    Err(ApiError::retryable("ThrottlingException", "Rate exceeded"))
}

#[async_trait]
impl LogStreamApi for MockLogStreamApi {
    async fn describe_stream(
        &self,
        _stream: &StreamId,
    ) -> Result<Option<StreamDescription>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.describe_calls += 1;
        if let Some(error) = state.describe_error.clone() {
            return Err(error);
        }
        Ok(state.stream_exists.then(|| StreamDescription {
            upload_sequence_token: state.upload_sequence_token.clone(),
        }))
    }

    async fn create_stream(&self, _stream: &StreamId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        if let Some(error) = state.create_error.clone() {
            return Err(error);
        }
        state.stream_exists = true;
        Ok(())
    }

    async fn put_log_events(
        &self,
        _stream: &StreamId,
        sequence_token: Option<String>,
        events: &[LogEvent],
    ) -> Result<PutLogEventsOutput, ApiError> {
        let latency = {
            let mut state = self.state.lock().unwrap();
            state.puts.push(PutCall {
                sequence_token,
                events: events.to_vec(),
                at: Instant::now(),
            });
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.put_latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        match state.put_results.pop_front() {
            Some(result) => result,
            None => {
                state.issued_tokens += 1;
                success(&format!("token-{}", state.issued_tokens))
            }
        }
    }
}
