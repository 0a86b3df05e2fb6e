//! Activity, probability and accounts pollers.
//!
//! Each poller is one endpoint path plus a decode function on top of the
//! shared [`Fetcher`]. Applying the result is left to the engine task.

use serde::Serialize;

use crate::error::FetchError;
use crate::fetcher::{Fetcher, RetryPolicy};
use crate::types::{Account, ActivityState, BusyProbability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Activity,
    Probability,
    Accounts,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Activity, Endpoint::Probability, Endpoint::Accounts];

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Activity => "activity",
            Endpoint::Probability => "probability",
            Endpoint::Accounts => "accounts",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Endpoint::Activity => "Activity poller",
            Endpoint::Probability => "Probability poller",
            Endpoint::Accounts => "Accounts poller",
        }
    }
}

/// A decoded payload from one of the three endpoints.
#[derive(Debug, Clone)]
pub enum PollResult {
    Activity(ActivityState),
    Probability(BusyProbability),
    Accounts(Vec<Account>),
}

/// Run one retrying fetch for `endpoint`.
pub async fn poll_endpoint(
    fetcher: &Fetcher,
    endpoint: Endpoint,
    policy: RetryPolicy,
) -> Result<PollResult, FetchError> {
    let path = endpoint.path();
    match endpoint {
        Endpoint::Activity => fetcher
            .fetch(path, ActivityState::decode, policy)
            .await
            .map(PollResult::Activity),
        Endpoint::Probability => fetcher
            .fetch(path, BusyProbability::decode, policy)
            .await
            .map(PollResult::Probability),
        Endpoint::Accounts => fetcher
            .fetch(path, Account::decode_list, policy)
            .await
            .map(PollResult::Accounts),
    }
}
