//! The ownership resolution engine.
//!
//! Every key moves through `Unknown -> Pending -> {Owned, NotOwnedOrFailed}`
//! at most once per generation. Checks run behind the shared
//! [`AdmissionGate`], so any number of `resolve` calls may be in flight while
//! only `limit` of them talk to the tool.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use super::retry::{retry_async, RetryPolicy};
use super::{candidate_commands, Generation, OwnershipKey, OwnershipState};
use crate::config::ResolverConfig;
use crate::error::{IpatoolError, Result};
use crate::gate::AdmissionGate;
use crate::models::{CatalogEntry, VersionList};
use crate::process::CommandEnvironment;

/// State change pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipUpdate {
    pub generation: u64,
    pub key: OwnershipKey,
    pub state: OwnershipState,
}

#[derive(Debug, Default)]
struct ResolutionStore {
    generation: Generation,
    states: HashMap<OwnershipKey, OwnershipState>,
    /// Keys whose check finished this generation, whatever the outcome.
    checked: HashSet<OwnershipKey>,
}

/// Deduplicating, bounded, retrying ownership checker.
#[derive(Debug)]
pub struct OwnershipResolver {
    gate: Arc<AdmissionGate>,
    policy: RetryPolicy,
    store: Mutex<ResolutionStore>,
    updates: broadcast::Sender<OwnershipUpdate>,
}

impl Default for OwnershipResolver {
    fn default() -> Self {
        Self::new(Arc::new(AdmissionGate::default()))
    }
}

impl OwnershipResolver {
    pub fn new(gate: Arc<AdmissionGate>) -> Self {
        let (updates, _) = broadcast::channel(ResolverConfig::UPDATE_CHANNEL_CAPACITY);
        Self {
            gate,
            policy: RetryPolicy::default(),
            store: Mutex::new(ResolutionStore::default()),
            updates,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn gate(&self) -> &Arc<AdmissionGate> {
        &self.gate
    }

    /// Discard all per-result-set state and start a new generation.
    ///
    /// Checks still running for the previous generation stop at their next
    /// attempt boundary and their results are ignored.
    pub fn begin_generation(&self) -> u64 {
        let mut store = self.lock();
        store.generation = store.generation.supersede();
        store.states.clear();
        store.checked.clear();
        debug!("Ownership generation {} started", store.generation.id());
        store.generation.id()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation.id()
    }

    /// Subscribe to state changes of the current and later generations.
    pub fn subscribe(&self) -> broadcast::Receiver<OwnershipUpdate> {
        self.updates.subscribe()
    }

    pub fn state(&self, key: &OwnershipKey) -> OwnershipState {
        self.lock().states.get(key).copied().unwrap_or_default()
    }

    pub fn is_checked(&self, key: &OwnershipKey) -> bool {
        self.lock().checked.contains(key)
    }

    /// All known states of the current generation, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<OwnershipKey, OwnershipState> {
        self.lock()
            .states
            .iter()
            .map(|(key, state)| (key.clone(), *state))
            .collect()
    }

    /// Record ownership learned elsewhere, e.g. from a successful purchase.
    pub fn mark_owned(&self, key: OwnershipKey) {
        let mut store = self.lock();
        let generation = store.generation.id();
        store.states.insert(key.clone(), OwnershipState::Owned);
        self.publish(generation, key, OwnershipState::Owned);
    }

    /// Determine whether `entry` is owned.
    ///
    /// A no-op returning the current state when the entry has no key, or its
    /// key is already owned, pending, or checked in this generation. Errors
    /// are never surfaced; an exhausted check resolves to
    /// [`OwnershipState::NotOwnedOrFailed`].
    pub async fn resolve(
        &self,
        entry: &CatalogEntry,
        environment: &CommandEnvironment,
    ) -> OwnershipState {
        let Some(key) = OwnershipKey::for_entry(entry) else {
            trace!("{} has no identifiers, skipping ownership check", entry.display_name());
            return OwnershipState::Unknown;
        };
        let Some(generation) = self.claim(&key) else {
            return self.state(&key);
        };

        let environment = environment.with_default_timeout(ResolverConfig::CHECK_TIMEOUT);
        let outcome = tokio::select! {
            permit = self.gate.permit() => {
                let _permit = permit;
                self.check_candidates(entry, &key, &environment, &generation)
                    .await
            }
            _ = generation.cancelled() => None,
        };
        if outcome.is_none() {
            debug!("Dropped check for {}: generation {} superseded", key, generation.id());
        }

        match outcome {
            Some(state) => self.complete(&key, &generation, state),
            None => self.state(&key),
        }
    }

    /// Resolve many entries concurrently; the gate bounds actual invocations.
    pub async fn resolve_all(&self, entries: &[CatalogEntry], environment: &CommandEnvironment) {
        futures::future::join_all(entries.iter().map(|entry| self.resolve(entry, environment)))
            .await;
    }

    fn claim(&self, key: &OwnershipKey) -> Option<Generation> {
        let mut store = self.lock();
        let current = store.states.get(key).copied().unwrap_or_default();
        if matches!(current, OwnershipState::Owned | OwnershipState::Pending)
            || store.checked.contains(key)
        {
            trace!("Skipping {}: {:?}", key, current);
            return None;
        }

        store.states.insert(key.clone(), OwnershipState::Pending);
        let generation = store.generation.clone();
        self.publish(generation.id(), key.clone(), OwnershipState::Pending);
        Some(generation)
    }

    fn complete(
        &self,
        key: &OwnershipKey,
        generation: &Generation,
        outcome: OwnershipState,
    ) -> OwnershipState {
        let mut store = self.lock();
        if store.generation.id() != generation.id() {
            debug!(
                "Discarding stale result for {} from generation {}",
                key,
                generation.id()
            );
            return store.states.get(key).copied().unwrap_or_default();
        }

        // A purchase may have confirmed ownership while the check ran.
        let state = match store.states.get(key) {
            Some(OwnershipState::Owned) => OwnershipState::Owned,
            _ => outcome,
        };
        store.states.insert(key.clone(), state);
        store.checked.insert(key.clone());
        self.publish(generation.id(), key.clone(), state);
        state
    }

    /// Returns `None` when the generation was cancelled mid-check.
    async fn check_candidates(
        &self,
        entry: &CatalogEntry,
        key: &OwnershipKey,
        environment: &CommandEnvironment,
        generation: &Generation,
    ) -> Option<OwnershipState> {
        for command in candidate_commands(entry) {
            let command = &command;
            let attempt = || query_candidate(environment, command, generation);

            let (result, stats) =
                retry_async(&self.policy, attempt, IpatoolError::is_retryable).await;

            match result {
                Ok(_) => {
                    info!("{} is owned ({})", key, command.join(" "));
                    return Some(OwnershipState::Owned);
                }
                Err(IpatoolError::Cancelled) => return None,
                Err(e) if e.is_license_required() => {
                    debug!("{} is not licensed via {}", key, command.join(" "));
                }
                Err(e) => {
                    debug!(
                        "{} check via {} failed after {} attempt(s), {:?} waiting: {}",
                        key,
                        command.join(" "),
                        stats.attempts,
                        stats.total_delay,
                        e
                    );
                }
            }
        }
        Some(OwnershipState::NotOwnedOrFailed)
    }

    fn publish(&self, generation: u64, key: OwnershipKey, state: OwnershipState) {
        // No subscribers is fine; the store stays the source of truth.
        let _ = self.updates.send(OwnershipUpdate {
            generation,
            key,
            state,
        });
    }

    fn lock(&self) -> MutexGuard<'_, ResolutionStore> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One attempt of one candidate command.
///
/// Superseding the generation abandons the running invocation; the process
/// runner kills the child when its future is dropped.
async fn query_candidate(
    environment: &CommandEnvironment,
    command: &[String],
    generation: &Generation,
) -> Result<VersionList> {
    generation.check()?;
    tokio::select! {
        result = environment.query::<VersionList>(command) => result,
        _ = generation.cancelled() => Err(IpatoolError::Cancelled),
    }
}
