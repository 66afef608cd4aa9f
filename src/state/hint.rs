use super::{EngineError, EngineResult, GameEngine};
use crate::types::*;

const MAX_HINT_ACTORS: usize = 3;

fn names_with_profession(candidate: &Candidate, profession: &str) -> Vec<String> {
    candidate
        .persons
        .iter()
        .filter(|p| {
            p.profession
                .as_deref()
                .is_some_and(|prof| prof.eq_ignore_ascii_case(profession))
        })
        .filter_map(|p| p.display_name())
        .map(str::to_string)
        .collect()
}

/// Year, genres and the people behind the title
pub fn build_hint(candidate: &Candidate) -> Hint {
    let mut actors = names_with_profession(candidate, "actor");
    actors.truncate(MAX_HINT_ACTORS);

    Hint {
        year: candidate.year,
        genres: candidate.genres.clone(),
        directors: names_with_profession(candidate, "director"),
        actors,
    }
}

impl GameEngine {
    /// Read-only; never touches the catalog or the phase
    pub async fn request_hint(&self) -> EngineResult<Hint> {
        let round = self.round.read().await;
        match round.phase {
            RoundPhase::Playing | RoundPhase::Revealed => round
                .candidate
                .as_ref()
                .map(build_hint)
                .ok_or(EngineError::NoActiveTitle),
            _ => Err(EngineError::NoActiveTitle),
        }
    }
}
