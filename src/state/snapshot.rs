//! Read-only view of the engine for clients.
//!
//! The candidate itself is withheld until the round is revealed; only the
//! outcome (which names the title) exposes it.

use super::GameEngine;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSnapshot {
    pub phase: RoundPhase,
    pub round_no: u64,
    pub images: Vec<ImageAsset>,
    pub streak: u32,
    pub history: Vec<HistoryEntry>,
    pub locked_out: bool,
    /// Sampling gave up; a new round has to be requested
    pub stalled: bool,
    /// Present only once the round is revealed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GuessOutcome>,
}

impl GameEngine {
    pub async fn snapshot(&self) -> EngineSnapshot {
        let round = self.round.read().await;
        let ledger = self.ledger.read().await;

        let outcome = match round.phase {
            RoundPhase::Revealed => round.outcome.clone(),
            _ => None,
        };

        EngineSnapshot {
            phase: round.phase,
            round_no: round.round_no,
            images: round.images.clone(),
            streak: ledger.streak(),
            history: ledger.history().to_vec(),
            locked_out: self.lockout.is_set(),
            stalled: round.stalled,
            outcome,
        }
    }
}
