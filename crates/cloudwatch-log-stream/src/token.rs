// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sequence token cache for one stream.
//!
//! The token is resolved lazily on the first flush: an existing stream hands
//! out its current upload token, a missing stream is created and starts with
//! no token. Once resolved, the cache only moves forward through
//! [`TokenManager::advance`], which the submitter calls after a successful put.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::api::{LogStreamApi, StreamId};
use crate::errors::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SequenceToken {
    /// Nothing is known about the stream yet.
    #[default]
    Unresolved,
    /// Token to present on the next put. `None` for a stream with no events.
    Resolved(Option<String>),
}

#[derive(Clone)]
pub struct TokenManager {
    api: Arc<dyn LogStreamApi>,
    stream: Arc<StreamId>,
    cache: Arc<Mutex<SequenceToken>>,
}

impl TokenManager {
    #[must_use]
    pub fn new(api: Arc<dyn LogStreamApi>, stream: Arc<StreamId>) -> Self {
        TokenManager {
            api,
            stream,
            cache: Arc::new(Mutex::new(SequenceToken::Unresolved)),
        }
    }

    /// Returns the cached token, resolving it remotely if needed.
    ///
    /// Remote failures are returned as-is; retrying is left to the next cycle.
    pub async fn get_token(&self) -> Result<Option<String>, ApiError> {
        if let SequenceToken::Resolved(token) = &*self.cache.lock().await {
            return Ok(token.clone());
        }

        let token = match self.api.describe_stream(&self.stream).await? {
            Some(description) => description.upload_sequence_token,
            None => {
                debug!("LOGS | Stream {} not found, creating it", self.stream);
                self.api.create_stream(&self.stream).await?;
                None
            }
        };

        *self.cache.lock().await = SequenceToken::Resolved(token.clone());
        Ok(token)
    }

    /// Token to send on the next put, without any remote lookup.
    pub async fn current(&self) -> Option<String> {
        match &*self.cache.lock().await {
            SequenceToken::Resolved(token) => token.clone(),
            SequenceToken::Unresolved => None,
        }
    }

    pub async fn state(&self) -> SequenceToken {
        self.cache.lock().await.clone()
    }

    /// Replaces the cached token with the one returned by a successful put.
    pub(crate) async fn advance(&self, next: Option<String>) {
        *self.cache.lock().await = SequenceToken::Resolved(next);
    }
}
