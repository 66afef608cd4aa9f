use super::{EngineError, EngineResult, GameEngine};
use crate::types::*;

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Exact match (case-insensitive, trimmed) against any known name variant
pub fn is_correct_guess(candidate: &Candidate, guess: &str) -> bool {
    let guess = normalize(guess);
    if guess.is_empty() {
        return false;
    }

    candidate
        .name_variants()
        .map(normalize)
        .any(|variant| variant == guess)
}

impl GameEngine {
    /// Evaluate a guess and reveal the round (PLAYING -> REVEALED)
    ///
    /// The history entry and the streak are recorded while the round lock is
    /// held, so the reveal and the ledger update are observed together.
    pub async fn submit_guess(&self, text: &str) -> EngineResult<GuessOutcome> {
        let mut round = self.round.write().await;
        if round.phase != RoundPhase::Playing {
            return Err(EngineError::WrongPhase {
                action: "submit a guess",
                phase: round.phase,
            });
        }
        let candidate = round.candidate.clone().ok_or(EngineError::NoActiveTitle)?;

        let correct = is_correct_guess(&candidate, text);
        let title = candidate.display_name().unwrap_or_default().to_string();

        let streak = self.ledger.write().await.record(HistoryEntry {
            candidate_id: candidate.id,
            title: title.clone(),
            poster_url: candidate.poster_url.clone(),
            correct,
            played_at: Some(chrono::Utc::now().to_rfc3339()),
        });

        // Invalidate any reload still in flight for this round
        self.sequence.claim();

        let outcome = GuessOutcome {
            correct,
            guess: text.trim().to_string(),
            title,
            candidate_id: candidate.id,
            poster_url: candidate.poster_url,
            streak,
        };

        round.phase = RoundPhase::Revealed;
        round.reloading = false;
        round.outcome = Some(outcome.clone());
        let round_no = round.round_no;
        drop(round);

        tracing::info!(round_no, correct, streak, "Round revealed");
        self.broadcast_state().await;
        Ok(outcome)
    }
}
