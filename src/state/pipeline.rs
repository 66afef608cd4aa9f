//! Image validation pipeline
//!
//! Fetches the candidate's image pool, drops empty/duplicate/known-bad URLs,
//! shuffles what is left and probes it in order until enough images load.
//! Every run advances the round sequence from the token it was started with,
//! so a run started by a superseded task never gets a live token.

use super::lock;
use super::session::{FailedUrlRegistry, Lockout, RoundSequence};
use crate::catalog::{CatalogProvider, ImageProber, ProbeOutcome};
use crate::types::{CandidateId, EngineConfig, ImageAsset};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Ready {
        images: Vec<ImageAsset>,
        token: u64,
    },
    /// Nothing loadable was found; `token` is still live
    Exhausted { token: u64 },
    /// A newer load took over; the result was discarded
    Superseded,
    LockedOut,
}

/// Borrowed view of the engine pieces one run needs
pub struct Pipeline<'a> {
    pub catalog: &'a dyn CatalogProvider,
    pub prober: &'a dyn ImageProber,
    pub failed_urls: &'a FailedUrlRegistry,
    pub lockout: &'a Lockout,
    pub sequence: &'a RoundSequence,
    pub probe_cancel: &'a Mutex<CancellationToken>,
    pub rng: &'a Mutex<StdRng>,
    pub config: &'a EngineConfig,
}

impl Pipeline<'_> {
    pub async fn run(&self, candidate: CandidateId, from: u64) -> PipelineOutcome {
        let Some((token, cancel)) = self.begin(from) else {
            tracing::debug!(candidate, from, "Pipeline start superseded");
            return PipelineOutcome::Superseded;
        };

        if self.lockout.is_set() {
            return PipelineOutcome::LockedOut;
        }

        let assets = match self
            .catalog
            .images(
                candidate,
                &self.config.image_types,
                self.config.image_pool_limit,
            )
            .await
        {
            Ok(assets) => assets,
            Err(e) if e.is_lockout() => {
                tracing::warn!(candidate, error = %e, "Image pool request rejected");
                return PipelineOutcome::LockedOut;
            }
            Err(e) => {
                tracing::warn!(candidate, error = %e, "Image pool request failed");
                Vec::new()
            }
        };

        if !self.sequence.is_current(token) {
            return PipelineOutcome::Superseded;
        }

        let failed = self.failed_urls.snapshot().await;
        let fetched = assets.len();
        let pool = {
            let mut rng = lock(self.rng);
            prepare_pool(assets, &failed, &mut *rng)
        };
        tracing::debug!(candidate, fetched, eligible = pool.len(), "Image pool prepared");

        self.walk(pool, token, &cancel).await
    }

    /// Advance the sequence and swap in a fresh cancellation token, cancelling
    /// the previous run's probes. Both happen under the same lock so an older
    /// run can never cancel a newer one.
    fn begin(&self, from: u64) -> Option<(u64, CancellationToken)> {
        let mut current = lock(self.probe_cancel);
        let token = self.sequence.advance(from)?;
        current.cancel();
        *current = CancellationToken::new();
        Some((token, current.clone()))
    }

    pub async fn walk(
        &self,
        pool: Vec<ImageAsset>,
        token: u64,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let wanted = self.config.images_per_round;
        let mut kept = Vec::with_capacity(wanted);

        for asset in pool {
            if kept.len() >= wanted {
                break;
            }
            if self.lockout.is_set() {
                return PipelineOutcome::LockedOut;
            }
            if !self.sequence.is_current(token) {
                return PipelineOutcome::Superseded;
            }

            match self.prober.probe(&asset.url, cancel.clone()).await {
                ProbeOutcome::Loadable => kept.push(asset),
                ProbeOutcome::Broken => {
                    tracing::debug!(url = %asset.url, "Image failed to load");
                    self.failed_urls.insert(&asset.url).await;
                }
                ProbeOutcome::Cancelled => {
                    // Lockout cancels the live run; nothing kept so far may commit
                    if self.lockout.is_set() {
                        return PipelineOutcome::LockedOut;
                    }
                    break;
                }
            }
        }

        if !self.sequence.is_current(token) {
            tracing::debug!(token, "Discarding stale pipeline result");
            return PipelineOutcome::Superseded;
        }

        if kept.is_empty() {
            PipelineOutcome::Exhausted { token }
        } else {
            PipelineOutcome::Ready {
                images: kept,
                token,
            }
        }
    }
}

/// Drop empty and known-bad URLs, dedupe (first wins) and shuffle
pub fn prepare_pool<R: Rng + ?Sized>(
    assets: Vec<ImageAsset>,
    failed: &HashSet<String>,
    rng: &mut R,
) -> Vec<ImageAsset> {
    let mut seen = HashSet::new();
    let mut pool: Vec<ImageAsset> = assets
        .into_iter()
        .filter(|asset| !asset.url.trim().is_empty())
        .filter(|asset| seen.insert(asset.url.clone()))
        .filter(|asset| !failed.contains(&asset.url))
        .collect();

    pool.shuffle(rng);
    pool
}
