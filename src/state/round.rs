use super::pipeline::PipelineOutcome;
use super::sampler::{self, SampleError};
use super::{EngineError, EngineResult, GameEngine};
use crate::types::*;

impl GameEngine {
    /// First activation: leave INITIAL and start loading a round
    pub async fn activate(&self) -> EngineResult<()> {
        if self.lockout.is_set() {
            return Err(EngineError::LockedOut);
        }

        let token = {
            let mut round = self.round.write().await;
            if round.phase != RoundPhase::Initial {
                return Ok(());
            }
            round.begin_loading();
            round.round_no += 1;
            self.sequence.claim()
        };

        tracing::info!("Engine activated");
        self.broadcast_state().await;
        self.spawn_resample(token);
        Ok(())
    }

    /// Explicit "next round" request
    pub async fn start_new_round(&self) -> EngineResult<()> {
        if self.lockout.is_set() {
            return Err(EngineError::LockedOut);
        }

        let (token, round_no) = {
            let mut round = self.round.write().await;
            match round.phase {
                RoundPhase::Initial | RoundPhase::Revealed => {}
                RoundPhase::Loading if round.stalled => {}
                phase => {
                    return Err(EngineError::WrongPhase {
                        action: "start a new round",
                        phase,
                    })
                }
            }
            round.begin_loading();
            round.round_no += 1;
            (self.sequence.claim(), round.round_no)
        };

        tracing::info!(round_no, "Starting new round");
        self.broadcast_state().await;
        self.spawn_resample(token);
        Ok(())
    }

    /// A displayed image stopped loading
    ///
    /// The URL is always registered as failed. Only a failure of an image in
    /// the current set while PLAYING feeds the reload policy: same-candidate
    /// reloads up to the configured limit, then a full resample.
    pub async fn report_image_failed(&self, url: &str) {
        let url = url.trim();
        if url.is_empty() {
            return;
        }

        if self.failed_urls.insert(url).await {
            tracing::debug!(url, "Registered failed image");
        }

        if self.lockout.is_set() {
            return;
        }

        enum Next {
            Reload(CandidateId, u64),
            Resample(u64),
        }

        let next = {
            let mut round = self.round.write().await;
            if round.phase != RoundPhase::Playing || round.reloading {
                return;
            }
            if !round.images.iter().any(|image| image.url == url) {
                return;
            }
            let Some(candidate_id) = round.candidate.as_ref().map(|c| c.id) else {
                return;
            };

            round.reload_attempts += 1;
            if round.reload_attempts <= self.config.max_image_reloads {
                round.reloading = true;
                Next::Reload(candidate_id, self.sequence.claim())
            } else {
                round.begin_loading();
                Next::Resample(self.sequence.claim())
            }
        };

        match next {
            Next::Reload(candidate_id, token) => {
                tracing::info!(candidate_id, url, "Reloading images for current title");
                let engine = self.clone();
                self.spawn_task(async move { engine.reload(candidate_id, token).await });
            }
            Next::Resample(token) => {
                tracing::info!(url, "Too many image failures, picking a new title");
                self.broadcast_state().await;
                self.spawn_resample(token);
            }
        }
    }

    fn spawn_resample(&self, token: u64) {
        let engine = self.clone();
        self.spawn_task(async move { engine.resample(token).await });
    }

    /// Sample, fetch details and validate images until a round is ready,
    /// the sampler gives up, or a newer load takes over
    async fn resample(&self, mut token: u64) {
        loop {
            if self.lockout.is_set() {
                return;
            }

            let recent = self
                .ledger
                .read()
                .await
                .recent_ids(self.config.recent_exclusion);

            let id = match sampler::sample_candidate(
                self.catalog.as_ref(),
                &self.lockout,
                &recent,
                self.config.sampling_attempts,
            )
            .await
            {
                Ok(id) => id,
                Err(SampleError::Exhausted(_)) => {
                    self.mark_stalled(token).await;
                    return;
                }
                Err(SampleError::LockedOut) => {
                    self.enter_lockout().await;
                    return;
                }
            };

            if !self.sequence.is_current(token) {
                return;
            }
            if self.lockout.is_set() {
                return;
            }

            let candidate = match self.catalog.title_details(id).await {
                Ok(candidate) if candidate.has_usable_name() => candidate,
                Ok(_) => {
                    tracing::debug!(id, "Title details have no usable name");
                    continue;
                }
                Err(e) if e.is_lockout() => {
                    tracing::warn!(id, error = %e, "Title details request rejected");
                    self.enter_lockout().await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "Title details request failed");
                    continue;
                }
            };

            if !self.sequence.is_current(token) {
                return;
            }

            match self.pipeline().run(candidate.id, token).await {
                PipelineOutcome::Ready { images, token } => {
                    self.commit_candidate(candidate, images, token).await;
                    return;
                }
                PipelineOutcome::Exhausted { token: live } => {
                    tracing::debug!(id = candidate.id, "No loadable images, resampling");
                    token = live;
                    tokio::task::yield_now().await;
                }
                PipelineOutcome::Superseded => return,
                PipelineOutcome::LockedOut => {
                    self.enter_lockout().await;
                    return;
                }
            }
        }
    }

    /// Same-candidate reload after an in-round image failure
    async fn reload(&self, candidate_id: CandidateId, token: u64) {
        match self.pipeline().run(candidate_id, token).await {
            PipelineOutcome::Ready { images, token } => {
                let committed = {
                    let mut round = self.round.write().await;
                    let same_title = round.candidate.as_ref().map(|c| c.id) == Some(candidate_id);
                    if self.sequence.is_current(token)
                        && round.phase == RoundPhase::Playing
                        && same_title
                    {
                        round.images = images;
                        round.reloading = false;
                        true
                    } else {
                        false
                    }
                };

                if committed {
                    tracing::info!(candidate_id, "Reloaded images for current title");
                    self.broadcast_state().await;
                } else {
                    tracing::debug!(candidate_id, "Dropping stale image reload");
                }
            }
            PipelineOutcome::Exhausted { token } => {
                let next = {
                    let mut round = self.round.write().await;
                    if self.sequence.is_current(token) && round.phase == RoundPhase::Playing {
                        round.begin_loading();
                        Some(self.sequence.claim())
                    } else {
                        None
                    }
                };

                if let Some(token) = next {
                    tracing::info!(candidate_id, "Reload found no images, picking a new title");
                    self.broadcast_state().await;
                    self.resample(token).await;
                }
            }
            PipelineOutcome::Superseded => {
                tracing::debug!(candidate_id, "Image reload superseded");
            }
            PipelineOutcome::LockedOut => {
                self.round.write().await.reloading = false;
                self.enter_lockout().await;
            }
        }
    }

    /// LOADING -> PLAYING, if this load is still the live one
    async fn commit_candidate(&self, candidate: Candidate, images: Vec<ImageAsset>, token: u64) {
        let round_no = {
            let mut round = self.round.write().await;
            if !self.sequence.is_current(token) || round.phase != RoundPhase::Loading {
                tracing::debug!(id = candidate.id, "Dropping stale round result");
                return;
            }

            round.phase = RoundPhase::Playing;
            round.candidate = Some(candidate);
            round.images = images;
            round.reload_attempts = 0;
            round.reloading = false;
            round.stalled = false;
            round.round_no
        };

        tracing::info!(round_no, "Round ready");
        self.broadcast_state().await;
    }

    async fn mark_stalled(&self, token: u64) {
        {
            let mut round = self.round.write().await;
            if !self.sequence.is_current(token) || round.phase != RoundPhase::Loading {
                return;
            }
            round.stalled = true;
        }

        tracing::warn!("No playable title found, waiting for a new round request");
        self.broadcast_state().await;
    }
}
