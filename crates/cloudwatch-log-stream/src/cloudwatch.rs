// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`LogStreamApi`] backed by the AWS CloudWatch Logs SDK.
//!
//! SDK-level retries are disabled: retrying is the submitter's job, and token
//! lookups are not retried at all.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudwatchlogs::config::http::HttpResponse;
use aws_sdk_cloudwatchlogs::config::retry::RetryConfig;
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudwatchlogs::operation::put_log_events::PutLogEventsError;
use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use aws_sdk_cloudwatchlogs::Client;
use tracing::debug;

use crate::api::{
    LogStreamApi, PutLogEventsOutput, RejectedLogEvents, StreamDescription, StreamId,
};
use crate::config::LogStreamConfig;
use crate::errors::ApiError;
use crate::log_event::LogEvent;

/// Service error codes worth another attempt.
const RETRYABLE_ERROR_CODES: [&str; 5] = [
    "ThrottlingException",
    "ServiceUnavailableException",
    "InvalidSequenceTokenException",
    "OperationAbortedException",
    "RequestTimeout",
];

#[derive(Clone, Debug)]
pub struct CloudWatchLogsApi {
    client: Client,
}

impl CloudWatchLogsApi {
    #[must_use]
    pub fn new(client: Client) -> Self {
        CloudWatchLogsApi { client }
    }

    /// Builds a client from the ambient AWS configuration, honoring the
    /// region and endpoint overrides in `config`.
    pub async fn from_config(config: &LogStreamConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_cloudwatchlogs::config::Builder::from(&sdk_config)
            .retry_config(RetryConfig::disabled());
        if let Some(endpoint_url) = &config.endpoint_url {
            debug!("LOGS | Using CloudWatch Logs endpoint {endpoint_url}");
            builder = builder.endpoint_url(endpoint_url);
        }

        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl LogStreamApi for CloudWatchLogsApi {
    async fn describe_stream(
        &self,
        stream: &StreamId,
    ) -> Result<Option<StreamDescription>, ApiError> {
        let mut next_token: Option<String> = None;

        // The lookup is by prefix, so the exact name may sit on a later page
        loop {
            let output = self
                .client
                .describe_log_streams()
                .log_group_name(&stream.log_group_name)
                .log_stream_name_prefix(&stream.log_stream_name)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;

            let found = output
                .log_streams()
                .iter()
                .find(|s| s.log_stream_name() == Some(stream.log_stream_name.as_str()));
            if let Some(log_stream) = found {
                return Ok(Some(StreamDescription {
                    upload_sequence_token: log_stream.upload_sequence_token().map(str::to_string),
                }));
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    async fn create_stream(&self, stream: &StreamId) -> Result<(), ApiError> {
        match self
            .client
            .create_log_stream()
            .log_group_name(&stream.log_group_name)
            .log_stream_name(&stream.log_stream_name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|service_error| service_error.is_resource_already_exists_exception()) =>
            {
                debug!("LOGS | Stream {stream} was created concurrently");
                Ok(())
            }
            Err(e) => Err(classify_sdk_error(&e)),
        }
    }

    async fn put_log_events(
        &self,
        stream: &StreamId,
        sequence_token: Option<String>,
        events: &[LogEvent],
    ) -> Result<PutLogEventsOutput, ApiError> {
        let log_events = events
            .iter()
            .map(|event| {
                InputLogEvent::builder()
                    .message(&event.message)
                    .timestamp(event.timestamp)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApiError::fatal("InvalidLogEvent", e.to_string()))?;

        let output = self
            .client
            .put_log_events()
            .log_group_name(&stream.log_group_name)
            .log_stream_name(&stream.log_stream_name)
            .set_sequence_token(sequence_token)
            .set_log_events(Some(log_events))
            .send()
            .await
            .map_err(|e| {
                let expected = e
                    .as_service_error()
                    .and_then(|service_error| match service_error {
                        PutLogEventsError::InvalidSequenceTokenException(inner) => {
                            inner.expected_sequence_token()
                        }
                        PutLogEventsError::DataAlreadyAcceptedException(inner) => {
                            inner.expected_sequence_token()
                        }
                        _ => None,
                    })
                    .map(str::to_string);
                classify_sdk_error(&e).with_expected_sequence_token(expected)
            })?;

        Ok(PutLogEventsOutput {
            next_sequence_token: output.next_sequence_token().map(str::to_string),
            rejected_log_events: output.rejected_log_events_info().map(|info| {
                RejectedLogEvents {
                    too_new_start_index: info.too_new_log_event_start_index(),
                    too_old_end_index: info.too_old_log_event_end_index(),
                    expired_end_index: info.expired_log_event_end_index(),
                }
            }),
        })
    }
}

fn classify_sdk_error<E>(err: &SdkError<E, HttpResponse>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match err {
        SdkError::ServiceError(context) => {
            let code = context.err().code().unwrap_or("Unknown");
            let message = context.err().message().unwrap_or_default();
            ApiError {
                code: code.to_string(),
                message: message.to_string(),
                retryable: is_retryable(code, context.raw().status().as_u16()),
                expected_sequence_token: None,
            }
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ApiError::retryable("TransportError", DisplayErrorContext(err).to_string())
        }
        _ => ApiError::fatal("ClientError", DisplayErrorContext(err).to_string()),
    }
}

/// Throttling, token races and server-side failures are transient.
fn is_retryable(code: &str, status: u16) -> bool {
    RETRYABLE_ERROR_CODES.contains(&code) || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_codes() {
        assert!(is_retryable("ThrottlingException", 400));
        assert!(is_retryable("InvalidSequenceTokenException", 400));
        assert!(is_retryable("ServiceUnavailableException", 503));
        assert!(is_retryable("Unknown", 500));
    }

    #[test]
    fn test_fatal_codes() {
        assert!(!is_retryable("DataAlreadyAcceptedException", 400));
        assert!(!is_retryable("ResourceNotFoundException", 400));
        assert!(!is_retryable("InvalidParameterException", 400));
        assert!(!is_retryable("UnrecognizedClientException", 400));
    }

    #[tokio::test]
    async fn test_from_config_with_overrides() {
        let config = LogStreamConfig::new("group", "stream")
            .with_region("eu-west-1")
            .with_endpoint_url("http://127.0.0.1:4566");

        let api = CloudWatchLogsApi::from_config(&config).await;
        assert_eq!(
            api.client.config().region().map(|r| r.as_ref()),
            Some("eu-west-1")
        );
    }
}
