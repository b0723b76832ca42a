//! Request handler: inbound event in, optional outbound event out.
//!
//! Every failure is logged here, once, with its full causal chain. Whether a
//! failure also produces an outbound event is decided by [`FailurePolicy`].

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::InventorySummary;
use crate::search::{SearchError, Searcher, decode_criteria};
use crate::transport::{InboundEvent, OutboundEvent};

/// What the handler emits when a request cannot be answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Drop the request; the requester never hears back.
    #[default]
    Silent,
    /// Answer with an empty result and the failure message.
    Respond,
}

impl FailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Respond => "respond",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown failure policy '{0}' (expected 'silent' or 'respond')")]
pub struct UnknownPolicy(pub String);

impl FromStr for FailurePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "respond" => Ok(Self::Respond),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Stateless, one-shot handler for search requests.
#[derive(Clone)]
pub struct RequestHandler {
    searcher: Searcher,
    policy: FailurePolicy,
}

impl RequestHandler {
    pub fn new(searcher: Searcher, policy: FailurePolicy) -> Self {
        Self { searcher, policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Answer one inbound event.
    ///
    /// Returns `None` when the request failed and the policy is
    /// [`FailurePolicy::Silent`].
    pub async fn handle(&self, event: InboundEvent) -> Option<OutboundEvent> {
        match self.answer(&event).await {
            Ok((hits, result)) => {
                info!(
                    aggregate_id = event.aggregate_id,
                    correlation_id = %event.correlation_id,
                    hits,
                    "search request answered"
                );
                Some(OutboundEvent::reply_to(&event, result))
            }
            Err(err) => {
                let message = format!("{err:#}");
                if matches!(
                    err.downcast_ref::<SearchError>(),
                    Some(SearchError::NoResults)
                ) {
                    info!(
                        aggregate_id = event.aggregate_id,
                        correlation_id = %event.correlation_id,
                        policy = %self.policy,
                        error = %message,
                        "search request failed"
                    );
                } else {
                    warn!(
                        aggregate_id = event.aggregate_id,
                        correlation_id = %event.correlation_id,
                        policy = %self.policy,
                        error = %message,
                        "search request failed"
                    );
                }
                match self.policy {
                    FailurePolicy::Silent => None,
                    FailurePolicy::Respond => {
                        let mut reply = OutboundEvent::reply_to(&event, Vec::new());
                        reply.error = Some(message);
                        Some(reply)
                    }
                }
            }
        }
    }

    /// Hit count and encoded payload for a successful search.
    async fn answer(&self, event: &InboundEvent) -> Result<(usize, Vec<u8>)> {
        if let Some(upstream) = &event.error {
            bail!("inbound event carried an upstream error: {upstream}");
        }

        let set =
            decode_criteria(&event.payload).context("failed to decode search criteria payload")?;
        debug!(
            correlation_id = %event.correlation_id,
            collections = set.len(),
            "decoded search criteria"
        );

        let records = self
            .searcher
            .search(&set)
            .await
            .context("inventory search failed")?;

        let summaries: Vec<InventorySummary> = records.iter().map(InventorySummary::from).collect();
        let payload =
            serde_json::to_vec(&summaries).context("failed to encode search results")?;
        Ok((summaries.len(), payload))
    }
}
