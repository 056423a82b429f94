// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::api::StreamId;
use crate::constants::{DEFAULT_BUFFER_LENGTH, DEFAULT_FLUSH_TIMEOUT};
use crate::errors::ConfigError;

/// Configuration of one stream service. Fixed once the service is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStreamConfig {
    pub log_group_name: String,
    pub log_stream_name: String,
    /// Pending record count that triggers an immediate flush
    pub buffer_length: usize,
    /// Longest time a pending record waits for a flush
    pub flush_timeout: Duration,
    /// AWS region, defaults to the SDK's region resolution
    pub region: Option<String>,
    /// Overrides the CloudWatch Logs endpoint (e.g. a local emulator)
    pub endpoint_url: Option<String>,
}

impl Default for LogStreamConfig {
    fn default() -> Self {
        Self {
            log_group_name: String::new(),
            log_stream_name: String::new(),
            buffer_length: DEFAULT_BUFFER_LENGTH,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            region: None,
            endpoint_url: None,
        }
    }
}

impl LogStreamConfig {
    pub fn new(log_group_name: impl Into<String>, log_stream_name: impl Into<String>) -> Self {
        Self {
            log_group_name: log_group_name.into(),
            log_stream_name: log_stream_name.into(),
            ..Default::default()
        }
    }

    /// Sets the buffer length. Zero keeps the default.
    #[must_use]
    pub fn with_buffer_length(mut self, buffer_length: usize) -> Self {
        if buffer_length > 0 {
            self.buffer_length = buffer_length;
        }
        self
    }

    /// Sets the flush timeout. A zero duration keeps the default.
    #[must_use]
    pub fn with_flush_timeout(mut self, flush_timeout: Duration) -> Self {
        if !flush_timeout.is_zero() {
            self.flush_timeout = flush_timeout;
        }
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_group_name = env::var("CLOUDWATCH_LOG_GROUP").unwrap_or_default();
        let log_stream_name = env::var("CLOUDWATCH_LOG_STREAM").unwrap_or_default();

        let buffer_length = env::var("CLOUDWATCH_BUFFER_LENGTH")
            .ok()
            .and_then(|val| parse_positive::<usize>("CLOUDWATCH_BUFFER_LENGTH", &val))
            .unwrap_or(DEFAULT_BUFFER_LENGTH);
        let flush_timeout = env::var("CLOUDWATCH_FLUSH_TIMEOUT_MS")
            .ok()
            .and_then(|val| parse_positive::<u64>("CLOUDWATCH_FLUSH_TIMEOUT_MS", &val))
            .map_or(DEFAULT_FLUSH_TIMEOUT, Duration::from_millis);

        let region = env::var("CLOUDWATCH_REGION")
            .or_else(|_| env::var("AWS_REGION"))
            .ok()
            .filter(|val| !val.trim().is_empty());
        let endpoint_url = env::var("CLOUDWATCH_ENDPOINT_URL")
            .ok()
            .filter(|val| !val.trim().is_empty());

        let config = Self {
            log_group_name,
            log_stream_name,
            buffer_length,
            flush_timeout,
            region,
            endpoint_url,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_group_name.trim().is_empty() {
            return Err(ConfigError::MissingLogGroup);
        }
        if self.log_stream_name.trim().is_empty() {
            return Err(ConfigError::MissingLogStream);
        }
        if self.buffer_length == 0 {
            return Err(ConfigError::InvalidConfig(
                "buffer length must be positive".to_string(),
            ));
        }
        if self.flush_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "flush timeout must be positive".to_string(),
            ));
        }
        if let Some(url) = &self.endpoint_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidConfig(format!(
                    "endpoint URL must use http or https: {url}"
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn stream_id(&self) -> StreamId {
        StreamId::new(&self.log_group_name, &self.log_stream_name)
    }
}

/// Non-positive or unparsable values are treated as unset.
fn parse_positive<T>(name: &str, val: &str) -> Option<T>
where
    T: FromStr + Default + PartialEq,
{
    match val.trim().parse::<T>() {
        Ok(n) if n != T::default() => Some(n),
        _ => {
            warn!("{name} must be a positive integer, got '{val}'. Using the default.");
            None
        }
    }
}
