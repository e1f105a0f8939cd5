//! Tag-based retention classification.
//!
//! An object is *eligible* for deletion when it has no tags, or when every
//! one of its tags names a pull request that the oracle reports as `closed`.
//! Anything else pins the object. Oracle failures pin too: a lookup error
//! can never lead to a deletion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::config::{validate_tag_pattern, CleanupConfig};
use crate::domain::{PullRequestRepo, PullRequestState};
use crate::error::CleanerResult;
use crate::registry_traits::PullRequestOracle;

/// Why a tag forces its object to be kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum KeepReason {
    /// The tag does not look like a pull request tag (release, `latest`, ...)
    NotPullRequestTag,
    /// The capture group did not yield an integer
    InvalidPullRequestId { captured: String },
    /// The pull request is open, or in a state other than `closed`
    PullRequestNotClosed { id: u64, state: String },
    /// The oracle could not answer
    LookupFailed { id: u64, error: String },
}

/// Outcome of classifying a single tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TagDecision {
    PullRequestClosed { id: u64 },
    Keep(KeepReason),
}

impl TagDecision {
    pub fn allows_deletion(&self) -> bool {
        matches!(self, TagDecision::PullRequestClosed { .. })
    }
}

/// Oracle usage counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierStats {
    /// Calls actually made to the oracle
    pub lookups: usize,
    /// Calls that failed
    pub lookup_failures: usize,
}

/// Decides whether a tag set pins its object.
///
/// Pull request states are memoised for the lifetime of the classifier,
/// which is one run. Failed lookups are not memoised.
pub struct TagClassifier {
    pattern: Regex,
    repo: PullRequestRepo,
    oracle: Arc<dyn PullRequestOracle>,
    states: Mutex<HashMap<u64, PullRequestState>>,
    lookups: AtomicUsize,
    lookup_failures: AtomicUsize,
}

impl TagClassifier {
    /// Create a classifier. `pattern` must have exactly one capture group.
    pub fn new(
        pattern: Regex,
        repo: PullRequestRepo,
        oracle: Arc<dyn PullRequestOracle>,
    ) -> CleanerResult<Self> {
        validate_tag_pattern(&pattern)?;
        Ok(TagClassifier {
            pattern,
            repo,
            oracle,
            states: Mutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
            lookup_failures: AtomicUsize::new(0),
        })
    }

    pub fn from_config(
        config: &CleanupConfig,
        oracle: Arc<dyn PullRequestOracle>,
    ) -> CleanerResult<Self> {
        Self::new(
            config.tag_pattern.clone(),
            config.pull_requests.clone(),
            oracle,
        )
    }

    /// True when the object carrying `tags` may be deleted (subject to its
    /// reference count). Stops at the first tag that keeps the object.
    pub async fn is_eligible_for_deletion(&self, tags: &[String]) -> bool {
        for tag in tags {
            let decision = self.classify_tag(tag).await;
            if let TagDecision::Keep(reason) = decision {
                trace!(tag = %tag, ?reason, "tag keeps object");
                return false;
            }
        }
        true
    }

    /// Classify a single tag, consulting the oracle when it names a PR.
    pub async fn classify_tag(&self, tag: &str) -> TagDecision {
        let Some(captures) = self.pattern.captures(tag) else {
            return TagDecision::Keep(KeepReason::NotPullRequestTag);
        };
        let captured = captures.get(1).map(|m| m.as_str()).unwrap_or_default();

        let id = match captured.parse::<u64>() {
            Ok(id) => id,
            Err(_) => {
                warn!(tag = %tag, captured = %captured, "unable to parse pull request identifier");
                return TagDecision::Keep(KeepReason::InvalidPullRequestId {
                    captured: captured.to_string(),
                });
            }
        };

        match self.pull_request_state(id).await {
            Ok(state) if state.is_closed() => TagDecision::PullRequestClosed { id },
            Ok(state) => TagDecision::Keep(KeepReason::PullRequestNotClosed {
                id,
                state: state.to_string(),
            }),
            Err(err) => {
                warn!(
                    tag = %tag,
                    pull_request = id,
                    error = %err,
                    "unable to check if a tag is related to a closed pull request, keeping it"
                );
                TagDecision::Keep(KeepReason::LookupFailed {
                    id,
                    error: err.to_string(),
                })
            }
        }
    }

    pub fn stats(&self) -> ClassifierStats {
        ClassifierStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
        }
    }

    async fn pull_request_state(&self, id: u64) -> CleanerResult<PullRequestState> {
        if let Some(state) = self.cached_state(id) {
            return Ok(state);
        }

        self.lookups.fetch_add(1, Ordering::Relaxed);
        match self.oracle.pull_request_state(&self.repo, id).await {
            Ok(state) => {
                if let Ok(mut states) = self.states.lock() {
                    states.insert(id, state.clone());
                }
                Ok(state)
            }
            Err(err) => {
                self.lookup_failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    fn cached_state(&self, id: u64) -> Option<PullRequestState> {
        self.states
            .lock()
            .ok()
            .and_then(|states| states.get(&id).cloned())
    }
}
