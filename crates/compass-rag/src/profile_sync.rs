//! Profile change detection and single-flight profile embedding.
//!
//! [`ProfileChangeDetector`] reduces each loaded snapshot to a
//! [`ProfileSignature`]. [`ProfileEmbeddingSynchronizer`] keeps the server's
//! profile embedding in step with the latest signature:
//!
//! - at most one embed call is in flight;
//! - signatures observed meanwhile collapse into one queued slot holding the
//!   latest, drained when the running call resolves;
//! - a signature equal to the last one successfully embedded issues no call
//!   unless forced.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use compass_core::{
    EmbeddingService, EmbeddingStatus, Error, EventBus, ProfileSignature, ProfileSnapshot, Result,
    SessionEvent,
};

use crate::status_map::StatusMap;

// =============================================================================
// CHANGE DETECTION
// =============================================================================

/// Result of observing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileChange {
    /// Same signature as the previous observation.
    Unchanged(ProfileSignature),
    Changed {
        previous: Option<ProfileSignature>,
        current: ProfileSignature,
    },
}

impl ProfileChange {
    pub fn signature(&self) -> &ProfileSignature {
        match self {
            Self::Unchanged(signature) => signature,
            Self::Changed { current, .. } => current,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Remembers the signature of the most recently observed snapshot.
#[derive(Debug, Clone, Default)]
pub struct ProfileChangeDetector {
    last_seen: Option<ProfileSignature>,
}

impl ProfileChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, snapshot: &ProfileSnapshot) -> ProfileChange {
        let current = ProfileSignature::of(snapshot);
        if self.last_seen.as_ref() == Some(&current) {
            return ProfileChange::Unchanged(current);
        }
        let previous = self.last_seen.replace(current.clone());
        ProfileChange::Changed { previous, current }
    }

    pub fn last_seen(&self) -> Option<&ProfileSignature> {
        self.last_seen.as_ref()
    }

    /// Whether `current` differs from what the server last embedded.
    pub fn needs_embedding(current: &ProfileSignature, last_embedded: Option<&ProfileSignature>) -> bool {
        last_embedded != Some(current)
    }

    pub fn reset(&mut self) {
        self.last_seen = None;
    }
}

// =============================================================================
// SYNCHRONIZER
// =============================================================================

/// What an observation or a forced re-embed led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Signature already embedded; no call issued.
    UpToDate,
    /// An embed call was started.
    Started,
    /// A call is running; this signature runs after it.
    Queued,
    /// The running call is already for this signature.
    AlreadyInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueuedRun {
    signature: ProfileSignature,
    forced: bool,
}

#[derive(Default)]
struct SyncState {
    detector: ProfileChangeDetector,
    last_embedded: Option<ProfileSignature>,
    in_flight: Option<ProfileSignature>,
    queued: Option<QueuedRun>,
    /// Bumped on reset; a drain loop from an older generation stops.
    generation: u64,
    drain: Option<JoinHandle<()>>,
}

struct SyncShared {
    embedder: Arc<dyn EmbeddingService>,
    statuses: StatusMap<ProfileSignature>,
    events: EventBus,
    state: Mutex<SyncState>,
}

impl SyncShared {
    async fn mark(&self, signature: &ProfileSignature, status: EmbeddingStatus) {
        self.statuses.set(signature.clone(), status.clone()).await;
        self.events.emit(SessionEvent::ProfileEmbedding {
            signature: signature.to_string(),
            status,
        });
    }

    /// Drop terminal entries of signatures that are neither current, queued
    /// nor `embedded`, so edits over a long session do not pile up.
    async fn prune(&self, state: &SyncState, embedded: &ProfileSignature) {
        let current = state.detector.last_seen().cloned();
        let queued = state.queued.as_ref().map(|q| q.signature.clone());
        let pruned = self
            .statuses
            .retain(|key, status| {
                status.is_in_flight()
                    || key == embedded
                    || current.as_ref() == Some(key)
                    || queued.as_ref() == Some(key)
            })
            .await;
        if pruned > 0 {
            debug!(pruned, "Pruned superseded profile embedding statuses");
        }
    }

    /// Run embed calls until nothing new is queued.
    async fn drain(self: Arc<Self>, mut signature: ProfileSignature, generation: u64) {
        loop {
            let start = Instant::now();
            let result = self.embedder.embed_profile().await;

            let mut state = self.state.lock().await;
            if state.generation != generation {
                debug!(signature = signature.short(), "Discarding profile embedding result from a cleared session");
                return;
            }

            match result {
                Ok(outcome) => {
                    info!(
                        signature = signature.short(),
                        cached = outcome.cached,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Profile embedded"
                    );
                    state.last_embedded = Some(signature.clone());
                    self.mark(&signature, EmbeddingStatus::success()).await;
                    self.prune(&state, &signature).await;
                }
                Err(e) => {
                    warn!(
                        signature = signature.short(),
                        error = %e,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Profile embedding failed"
                    );
                    self.mark(&signature, EmbeddingStatus::failed(e.to_string())).await;
                }
            }

            match state.queued.take() {
                Some(run)
                    if run.forced
                        || ProfileChangeDetector::needs_embedding(
                            &run.signature,
                            state.last_embedded.as_ref(),
                        ) =>
                {
                    debug!(signature = run.signature.short(), forced = run.forced, "Running queued profile embedding");
                    state.in_flight = Some(run.signature.clone());
                    self.mark(&run.signature, EmbeddingStatus::embedding()).await;
                    signature = run.signature;
                }
                Some(run) => {
                    // Queued signature is what the server already holds.
                    debug!(signature = run.signature.short(), "Queued profile embedding no longer needed");
                    self.mark(&run.signature, EmbeddingStatus::success()).await;
                    self.prune(&state, &run.signature).await;
                    state.in_flight = None;
                    return;
                }
                None => {
                    state.in_flight = None;
                    return;
                }
            }
        }
    }
}

/// Drives the profile embedding. Clones share state.
#[derive(Clone)]
pub struct ProfileEmbeddingSynchronizer {
    shared: Arc<SyncShared>,
}

impl ProfileEmbeddingSynchronizer {
    pub fn new(embedder: Arc<dyn EmbeddingService>, events: EventBus) -> Self {
        Self {
            shared: Arc::new(SyncShared {
                embedder,
                statuses: StatusMap::new(),
                events,
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    /// Feed a freshly loaded snapshot.
    pub async fn observe(&self, snapshot: &ProfileSnapshot) -> SyncDecision {
        let mut state = self.shared.state.lock().await;
        let change = state.detector.observe(snapshot);
        debug!(
            signature = change.signature().short(),
            changed = change.is_changed(),
            "Profile observed"
        );
        let signature = change.signature().clone();
        self.schedule(&mut state, signature, false).await
    }

    /// Re-issue the embed call for the current signature even if it was
    /// already embedded.
    pub async fn force_re_embed(&self) -> Result<SyncDecision> {
        let mut state = self.shared.state.lock().await;
        let signature = state
            .detector
            .last_seen()
            .cloned()
            .ok_or_else(|| Error::NotReady("no profile has been loaded".to_string()))?;
        info!(signature = signature.short(), "Forced profile re-embedding");
        Ok(self.schedule(&mut state, signature, true).await)
    }

    async fn schedule(
        &self,
        state: &mut SyncState,
        signature: ProfileSignature,
        forced: bool,
    ) -> SyncDecision {
        if let Some(in_flight) = state.in_flight.clone() {
            if in_flight == signature && !forced {
                // The latest input is already running; an older queued
                // signature is stale.
                if let Some(stale) = state.queued.take_if(|q| q.signature != signature) {
                    self.shared.statuses.remove(&stale.signature).await;
                }
                return SyncDecision::AlreadyInFlight;
            }

            let forced = forced
                || state
                    .queued
                    .as_ref()
                    .is_some_and(|q| q.forced && q.signature == signature);
            if let Some(stale) = state.queued.take_if(|q| q.signature != signature) {
                debug!(
                    replaced = stale.signature.short(),
                    signature = signature.short(),
                    "Replacing queued profile signature"
                );
                // A forced rerun of the running signature shares its entry.
                if stale.signature != in_flight {
                    self.shared.statuses.remove(&stale.signature).await;
                }
            }
            warn!(
                in_flight = in_flight.short(),
                queued = signature.short(),
                "Profile embedding in flight; follow-up coalesced"
            );
            state.queued = Some(QueuedRun {
                signature: signature.clone(),
                forced,
            });
            if signature != in_flight {
                self.shared.mark(&signature, EmbeddingStatus::pending()).await;
            }
            return SyncDecision::Queued;
        }

        if !forced && !ProfileChangeDetector::needs_embedding(&signature, state.last_embedded.as_ref()) {
            return SyncDecision::UpToDate;
        }

        state.in_flight = Some(signature.clone());
        self.shared.mark(&signature, EmbeddingStatus::embedding()).await;
        let shared = self.shared.clone();
        let generation = state.generation;
        state.drain = Some(tokio::spawn(shared.drain(signature, generation)));
        SyncDecision::Started
    }

    /// Wait until no embed call is running or queued.
    pub async fn settle(&self) {
        loop {
            let handle = self.shared.state.lock().await.drain.take();
            match handle {
                Some(handle) => {
                    if let Err(e) = handle.await {
                        error!(error = ?e, "Profile embedding task panicked");
                    }
                }
                None => return,
            }
        }
    }

    /// Signature of the most recently observed snapshot.
    pub async fn current_signature(&self) -> Option<ProfileSignature> {
        self.shared.state.lock().await.detector.last_seen().cloned()
    }

    pub async fn last_embedded(&self) -> Option<ProfileSignature> {
        self.shared.state.lock().await.last_embedded.clone()
    }

    pub async fn is_in_flight(&self) -> bool {
        self.shared.state.lock().await.in_flight.is_some()
    }

    /// Status of the current signature; `None` before the first
    /// observation.
    pub async fn current_status(&self) -> Option<EmbeddingStatus> {
        let current = self.current_signature().await?;
        Some(self.shared.statuses.get(&current).await.unwrap_or_default())
    }

    pub async fn statuses(&self) -> HashMap<ProfileSignature, EmbeddingStatus> {
        self.shared.statuses.snapshot().await
    }

    /// Forget that anything was embedded, keeping the current signature.
    /// The next observation embeds again.
    pub async fn reset_embeddings(&self) {
        let mut state = self.shared.state.lock().await;
        Self::abandon(&mut state);
        state.last_embedded = None;
        self.shared.statuses.clear().await;
    }

    /// Drop all state, including the current signature.
    pub async fn reset(&self) {
        let mut state = self.shared.state.lock().await;
        Self::abandon(&mut state);
        state.last_embedded = None;
        state.detector.reset();
        self.shared.statuses.clear().await;
    }

    /// Stop consuming results of the running call. The server-side work is
    /// not aborted.
    fn abandon(state: &mut SyncState) {
        state.generation += 1;
        state.in_flight = None;
        state.queued = None;
        state.drain = None;
    }
}
