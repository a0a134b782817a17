//! A search result set with its artwork and ownership state.
//!
//! Each successful search starts a new resolver generation, then schedules two
//! background units for the new entries: a best-effort artwork lookup and an
//! ownership refresh. Both run on the tokio runtime and never block the
//! caller.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::api::{normalize_term, IpatoolApi, PurchaseOutcome};
use crate::artwork::ArtworkLookupService;
use crate::error::Result;
use crate::models::{CatalogEntry, SearchResults};
use crate::ownership::{OwnershipKey, OwnershipResolver, OwnershipState, OwnershipUpdate};

/// Entry as presented to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryStatus {
    pub entry: CatalogEntry,
    pub ownership: OwnershipState,
    pub artwork: Option<Url>,
}

#[derive(Debug, Default)]
struct SessionState {
    results: Vec<CatalogEntry>,
    /// Survives across searches; artwork does not change between queries.
    artwork: HashMap<i64, Url>,
}

/// Current search results plus the background work attached to them.
pub struct SearchSession {
    api: IpatoolApi,
    artwork: ArtworkLookupService,
    resolver: Arc<OwnershipResolver>,
    state: Arc<Mutex<SessionState>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Number of searches started; identifies the latest one.
    searches: AtomicU64,
}

impl SearchSession {
    pub fn new(api: IpatoolApi, artwork: ArtworkLookupService) -> Self {
        Self::with_resolver(api, artwork, Arc::new(OwnershipResolver::default()))
    }

    pub fn with_resolver(
        api: IpatoolApi,
        artwork: ArtworkLookupService,
        resolver: Arc<OwnershipResolver>,
    ) -> Self {
        Self {
            api,
            artwork,
            resolver,
            state: Arc::new(Mutex::new(SessionState::default())),
            tasks: Mutex::new(Vec::new()),
            searches: AtomicU64::new(0),
        }
    }

    pub fn api(&self) -> &IpatoolApi {
        &self.api
    }

    pub fn resolver(&self) -> &Arc<OwnershipResolver> {
        &self.resolver
    }

    /// Run a search and make its entries the current result set.
    ///
    /// The previous results and their ownership state are only replaced once
    /// the search succeeds. If another search started while this one was
    /// running, the results are returned but not adopted.
    pub async fn search(&self, term: &str, limit: u32) -> Result<SearchResults> {
        normalize_term(term)?;
        let sequence = self.searches.fetch_add(1, Ordering::SeqCst) + 1;

        let results = self.api.search(term, limit).await?;
        if self.searches.load(Ordering::SeqCst) != sequence {
            debug!("Search for '{}' superseded, not adopting results", term.trim());
            return Ok(results);
        }

        self.resolver.begin_generation();
        lock(&self.state).results = results.apps.clone();
        self.schedule_artwork(&results.apps);
        self.schedule_ownership_refresh(results.apps.clone());
        Ok(results)
    }

    /// Purchase an app and record it as owned on success.
    pub async fn purchase(&self, bundle_id: &str) -> Result<PurchaseOutcome> {
        let outcome = self.api.purchase(bundle_id).await?;
        if outcome == PurchaseOutcome::Purchased {
            self.resolver.mark_owned(OwnershipKey::for_bundle(bundle_id));
        }
        Ok(outcome)
    }

    /// Check one entry now, e.g. when it scrolls into view.
    pub async fn ensure_status(&self, entry: &CatalogEntry) -> OwnershipState {
        self.resolver.resolve(entry, self.api.environment()).await
    }

    pub fn results(&self) -> Vec<CatalogEntry> {
        lock(&self.state).results.clone()
    }

    pub fn is_owned(&self, entry: &CatalogEntry) -> bool {
        self.any_key_in(entry, OwnershipState::Owned)
    }

    pub fn is_checking(&self, entry: &CatalogEntry) -> bool {
        self.any_key_in(entry, OwnershipState::Pending)
    }

    /// Ownership of an entry as consumers should display it.
    pub fn ownership(&self, entry: &CatalogEntry) -> OwnershipState {
        if self.is_owned(entry) {
            return OwnershipState::Owned;
        }
        OwnershipKey::for_entry(entry)
            .map(|key| self.resolver.state(&key))
            .unwrap_or_default()
    }

    /// The entry's own artwork, else whatever the lookup found.
    pub fn artwork_url(&self, entry: &CatalogEntry) -> Option<Url> {
        entry.direct_artwork().or_else(|| {
            entry
                .track_id
                .and_then(|id| lock(&self.state).artwork.get(&id).cloned())
        })
    }

    /// Current results merged with artwork and ownership.
    pub fn view(&self) -> Vec<EntryStatus> {
        self.results()
            .into_iter()
            .map(|entry| EntryStatus {
                ownership: self.ownership(&entry),
                artwork: self.artwork_url(&entry),
                entry,
            })
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OwnershipUpdate> {
        self.resolver.subscribe()
    }

    /// Wait for all background work scheduled so far.
    pub async fn wait_idle(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.tasks));
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(e) = task.await {
                    warn!("Background session task failed: {}", e);
                }
            }
        }
    }

    fn any_key_in(&self, entry: &CatalogEntry, wanted: OwnershipState) -> bool {
        OwnershipKey::all_for_entry(entry)
            .iter()
            .any(|key| self.resolver.state(key) == wanted)
    }

    fn schedule_artwork(&self, entries: &[CatalogEntry]) {
        let missing: Vec<i64> = {
            let state = lock(&self.state);
            entries
                .iter()
                .filter(|entry| entry.direct_artwork().is_none())
                .filter_map(|entry| entry.track_id)
                .filter(|id| !state.artwork.contains_key(id))
                .collect()
        };
        if missing.is_empty() {
            return;
        }

        let artwork = self.artwork.clone();
        let state = self.state.clone();
        self.spawn(async move {
            let found = artwork.lookup(missing).await;
            lock(&state).artwork.extend(found);
        });
    }

    fn schedule_ownership_refresh(&self, entries: Vec<CatalogEntry>) {
        let resolver = self.resolver.clone();
        let environment = self.api.environment().clone();
        self.spawn(async move {
            resolver.resolve_all(&entries, &environment).await;
        });
    }

    fn spawn<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut tasks = lock(&self.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(tokio::spawn(future));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
