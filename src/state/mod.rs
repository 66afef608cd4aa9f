mod guess;
mod hint;
mod ledger;
mod pipeline;
mod round;
mod sampler;
mod session;
mod snapshot;

pub use guess::is_correct_guess;
pub use hint::build_hint;
pub use ledger::{Ledger, HISTORY_KEY, STREAK_KEY};
pub use pipeline::{prepare_pool, PipelineOutcome};
pub use sampler::SampleError;
pub use session::{FailedUrlRegistry, Lockout, RoundSequence};
pub use snapshot::EngineSnapshot;

use crate::catalog::{CatalogProvider, ImageProber};
use crate::protocol::ServerMessage;
use crate::storage::KeyValueStore;
use crate::types::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub type EngineResult<T> = Result<T, EngineError>;

/// Action refused by the engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Cannot {action} while the round is {phase:?}")]
    WrongPhase {
        action: &'static str,
        phase: RoundPhase,
    },

    #[error("The catalog has blocked this session")]
    LockedOut,

    #[error("No title is active")]
    NoActiveTitle,
}

impl EngineError {
    /// Stable code for protocol error messages
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::WrongPhase { .. } => "WRONG_PHASE",
            EngineError::LockedOut => "LOCKED_OUT",
            EngineError::NoActiveTitle => "NO_ACTIVE_TITLE",
        }
    }
}

/// Mutable state of the current round
#[derive(Debug, Clone)]
pub(crate) struct Round {
    pub phase: RoundPhase,
    pub round_no: u64,
    pub candidate: Option<Candidate>,
    pub images: Vec<ImageAsset>,
    /// Same-candidate reloads spent on the current candidate
    pub reload_attempts: u32,
    pub reloading: bool,
    pub outcome: Option<GuessOutcome>,
    /// Sampler gave up; waiting for an explicit new round
    pub stalled: bool,
}

impl Round {
    fn new() -> Self {
        Self {
            phase: RoundPhase::Initial,
            round_no: 0,
            candidate: None,
            images: Vec::new(),
            reload_attempts: 0,
            reloading: false,
            outcome: None,
            stalled: false,
        }
    }

    /// Drop the current candidate and everything derived from it
    fn begin_loading(&mut self) {
        self.phase = RoundPhase::Loading;
        self.candidate = None;
        self.images.clear();
        self.reload_attempts = 0;
        self.reloading = false;
        self.outcome = None;
        self.stalled = false;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The guess-the-title game engine
///
/// Cheap to clone; every clone drives the same session. Session guards
/// (lockout, failed URLs, sequence token, RNG) belong to this instance only.
#[derive(Clone)]
pub struct GameEngine {
    pub(crate) round: Arc<RwLock<Round>>,
    pub(crate) ledger: Arc<RwLock<Ledger>>,
    catalog: Arc<dyn CatalogProvider>,
    prober: Arc<dyn ImageProber>,
    lockout: Lockout,
    failed_urls: FailedUrlRegistry,
    sequence: RoundSequence,
    probe_cancel: Arc<Mutex<CancellationToken>>,
    rng: Arc<Mutex<StdRng>>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    /// Broadcast channel for state updates to every connected client
    pub broadcast: broadcast::Sender<ServerMessage>,
    config: Arc<EngineConfig>,
}

impl GameEngine {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        prober: Arc<dyn ImageProber>,
        store: Arc<dyn KeyValueStore>,
        config: EngineConfig,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let ledger = Ledger::load(store, config.history_limit);

        tracing::info!(
            catalog = catalog.name(),
            seeded = config.seed.is_some(),
            "Game engine created"
        );

        Self {
            round: Arc::new(RwLock::new(Round::new())),
            ledger: Arc::new(RwLock::new(ledger)),
            catalog,
            prober,
            lockout: Lockout::default(),
            failed_urls: FailedUrlRegistry::default(),
            sequence: RoundSequence::default(),
            probe_cancel: Arc::new(Mutex::new(CancellationToken::new())),
            rng: Arc::new(Mutex::new(rng)),
            tasks: Arc::new(Mutex::new(Vec::new())),
            broadcast: tx,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.broadcast.subscribe()
    }

    pub async fn phase(&self) -> RoundPhase {
        self.round.read().await.phase
    }

    pub async fn images(&self) -> Vec<ImageAsset> {
        self.round.read().await.images.clone()
    }

    pub async fn streak(&self) -> u32 {
        self.ledger.read().await.streak()
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.ledger.read().await.history().to_vec()
    }

    pub fn is_locked_out(&self) -> bool {
        self.lockout.is_set()
    }

    pub fn failed_urls(&self) -> &FailedUrlRegistry {
        &self.failed_urls
    }

    /// Send the current snapshot to every subscriber
    pub async fn broadcast_state(&self) {
        let snapshot = self.snapshot().await;
        let _ = self.broadcast.send(ServerMessage::State { snapshot });
    }

    /// Set the lockout; the first caller announces it
    async fn enter_lockout(&self) {
        if self.lockout.trip() {
            tracing::warn!("Catalog rejected the session, halting all catalog work");
            self.probe_cancel_current();
            let _ = self.broadcast.send(ServerMessage::Blocked {
                msg: "The catalog refused further requests. Restart the game later.".to_string(),
            });
            self.broadcast_state().await;
        }
    }

    fn probe_cancel_current(&self) {
        lock(&self.probe_cancel).cancel();
    }

    fn pipeline(&self) -> pipeline::Pipeline<'_> {
        pipeline::Pipeline {
            catalog: self.catalog.as_ref(),
            prober: self.prober.as_ref(),
            failed_urls: &self.failed_urls,
            lockout: &self.lockout,
            sequence: &self.sequence,
            probe_cancel: &self.probe_cancel,
            rng: &self.rng,
            config: &self.config,
        }
    }

    /// Run a future in the background, tracked for `wait_for_background`
    fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Wait until no background load work is left (including work spawned
    /// while waiting)
    pub async fn wait_for_background(&self) {
        loop {
            let pending: Vec<_> = std::mem::take(&mut *lock(&self.tasks));
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Background task failed");
                }
            }
        }
    }
}
