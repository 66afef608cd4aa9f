//! In-memory catalog collaborators
//!
//! Deterministic stand-ins for the HTTP catalog and prober. Random titles are
//! served from an explicit script first, then round-robin over the known
//! titles. Every call is counted so callers can assert on upstream traffic.

use super::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(what: String) -> CatalogError {
    CatalogError::Status {
        status: 404,
        message: what,
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    titles: Mutex<Vec<Candidate>>,
    images: Mutex<HashMap<CandidateId, Vec<ImageAsset>>>,
    random_script: Mutex<VecDeque<CatalogResult<TitleSummary>>>,
    detail_failures: Mutex<HashMap<CandidateId, CatalogError>>,
    outage: Mutex<Option<CatalogError>>,
    cursor: AtomicUsize,
    random_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    image_calls: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a title together with its image pool
    pub fn with_title(self, candidate: Candidate, images: Vec<ImageAsset>) -> Self {
        self.add_title(candidate, images);
        self
    }

    pub fn add_title(&self, candidate: Candidate, images: Vec<ImageAsset>) {
        lock(&self.images).insert(candidate.id, images);
        lock(&self.titles).push(candidate);
    }

    pub fn set_images(&self, id: CandidateId, images: Vec<ImageAsset>) {
        lock(&self.images).insert(id, images);
    }

    /// Queue an explicit response for the next random-title request
    pub fn script_random(&self, response: CatalogResult<TitleSummary>) {
        lock(&self.random_script).push_back(response);
    }

    pub fn fail_details(&self, id: CandidateId, error: CatalogError) {
        lock(&self.detail_failures).insert(id, error);
    }

    /// Make every subsequent call fail with `error` (None restores service)
    pub fn set_outage(&self, error: Option<CatalogError>) {
        *lock(&self.outage) = error;
    }

    pub fn random_calls(&self) -> usize {
        self.random_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    fn check_outage(&self) -> CatalogResult<()> {
        match lock(&self.outage).as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalog {
    async fn random_title(&self) -> CatalogResult<TitleSummary> {
        self.random_calls.fetch_add(1, Ordering::SeqCst);
        self.check_outage()?;

        if let Some(scripted) = lock(&self.random_script).pop_front() {
            return scripted;
        }

        let titles = lock(&self.titles);
        if titles.is_empty() {
            return Err(not_found("catalog is empty".to_string()));
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % titles.len();
        let title = &titles[index];

        Ok(TitleSummary {
            id: Some(title.id),
            name: title.name.clone(),
            alternative_name: title.alternative_name.clone(),
        })
    }

    async fn title_details(&self, id: CandidateId) -> CatalogResult<Candidate> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.check_outage()?;

        if let Some(error) = lock(&self.detail_failures).get(&id) {
            return Err(error.clone());
        }

        lock(&self.titles)
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| not_found(format!("title {} not found", id)))
    }

    async fn images(
        &self,
        id: CandidateId,
        types: &[String],
        limit: u32,
    ) -> CatalogResult<Vec<ImageAsset>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.check_outage()?;

        let images = lock(&self.images);
        Ok(images
            .get(&id)
            .map(|pool| {
                pool.iter()
                    .filter(|image| types.is_empty() || types.contains(&image.kind))
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Prober with a fixed set of broken URLs and a pause switch
pub struct ScriptedProber {
    broken: Mutex<HashSet<String>>,
    probed: Mutex<Vec<String>>,
    paused: watch::Sender<bool>,
}

impl Default for ScriptedProber {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProber {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            broken: Mutex::new(HashSet::new()),
            probed: Mutex::new(Vec::new()),
            paused,
        }
    }

    pub fn with_broken<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prober = Self::new();
        lock(&prober.broken).extend(urls.into_iter().map(Into::into));
        prober
    }

    pub fn mark_broken(&self, url: &str) {
        lock(&self.broken).insert(url.to_string());
    }

    /// Hold every probe (new and in-flight) until `resume` or cancellation
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// URLs probed so far, in call order
    pub fn probed(&self) -> Vec<String> {
        lock(&self.probed).clone()
    }

    pub fn probe_count(&self) -> usize {
        lock(&self.probed).len()
    }
}

#[async_trait]
impl ImageProber for ScriptedProber {
    async fn probe(&self, url: &str, cancel: CancellationToken) -> ProbeOutcome {
        lock(&self.probed).push(url.to_string());

        let mut gate = self.paused.subscribe();
        loop {
            let paused = *gate.borrow_and_update();
            if !paused {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => return ProbeOutcome::Cancelled,
                changed = gate.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            ProbeOutcome::Cancelled
        } else if lock(&self.broken).contains(url) {
            ProbeOutcome::Broken
        } else {
            ProbeOutcome::Loadable
        }
    }
}
