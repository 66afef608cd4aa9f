//! Session-scoped guards owned by one engine instance.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Permanent block after a permission/rate-limit failure
#[derive(Debug, Clone, Default)]
pub struct Lockout(Arc<AtomicBool>);

impl Lockout {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns true only for the call that actually set the flag
    pub fn trip(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

/// Image URLs that failed to load at least once
#[derive(Debug, Clone, Default)]
pub struct FailedUrlRegistry(Arc<RwLock<HashSet<String>>>);

impl FailedUrlRegistry {
    pub async fn insert(&self, url: &str) -> bool {
        self.0.write().await.insert(url.to_string())
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.0.read().await.contains(url)
    }

    pub async fn len(&self) -> usize {
        self.0.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.0.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> HashSet<String> {
        self.0.read().await.clone()
    }
}

/// Monotonic round sequence token
///
/// `claim` unconditionally starts a new sequence and invalidates every older
/// token. `advance` moves forward only from the live value, so a superseded
/// task can never invalidate a newer one.
#[derive(Debug, Clone, Default)]
pub struct RoundSequence(Arc<AtomicU64>);

impl RoundSequence {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.current() == token
    }

    pub fn claim(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn advance(&self, from: u64) -> Option<u64> {
        self.0
            .compare_exchange(from, from + 1, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|previous| previous + 1)
    }
}
