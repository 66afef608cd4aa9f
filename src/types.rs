use serde::{Deserialize, Serialize};

/// Catalog identifier of a title
pub type CandidateId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundPhase {
    Initial,
    Loading,
    Playing,
    Revealed,
}

/// Tunables for the game engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on random-title requests per sampling pass
    pub sampling_attempts: u32,
    /// How many of the latest history entries are excluded from sampling
    pub recent_exclusion: usize,
    /// Maximum number of persisted history entries
    pub history_limit: usize,
    /// Images shown per round
    pub images_per_round: usize,
    /// Page size requested from the image pool
    pub image_pool_limit: u32,
    /// Image type tags accepted from the catalog
    pub image_types: Vec<String>,
    /// Consecutive same-title reloads before a full resample
    pub max_image_reloads: u32,
    /// Seed for the shuffle RNG (None = OS entropy)
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sampling_attempts: 20,
            recent_exclusion: 10,
            history_limit: 20,
            images_per_round: 5,
            image_pool_limit: 200,
            image_types: vec!["still".to_string(), "screenshot".to_string()],
            max_image_reloads: 3,
            seed: None,
        }
    }
}

/// Result of the random-title endpoint, before details are fetched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TitleSummary {
    pub id: Option<CandidateId>,
    pub name: Option<String>,
    pub alternative_name: Option<String>,
}

impl TitleSummary {
    /// Primary or alternate name present after trimming
    pub fn has_usable_name(&self) -> bool {
        [&self.name, &self.alternative_name]
            .into_iter()
            .flatten()
            .any(|n| !n.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub name: Option<String>,
    pub en_name: Option<String>,
    /// English profession tag ("director", "actor", ...)
    pub profession: Option<String>,
}

impl Person {
    pub fn display_name(&self) -> Option<&str> {
        [&self.name, &self.en_name]
            .into_iter()
            .flatten()
            .map(|n| n.trim())
            .find(|n| !n.is_empty())
    }
}

/// The title being guessed, with the details cached for hints and history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: Option<String>,
    pub alternative_name: Option<String>,
    /// Localized and alternate spellings
    #[serde(default)]
    pub aliases: Vec<String>,
    pub year: Option<u32>,
    pub poster_url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub persons: Vec<Person>,
}

impl Candidate {
    pub fn new(id: CandidateId, name: &str) -> Self {
        Self {
            id,
            name: Some(name.to_string()),
            alternative_name: None,
            aliases: Vec::new(),
            year: None,
            poster_url: None,
            genres: Vec::new(),
            persons: Vec::new(),
        }
    }

    /// Every known name, in preference order (primary, alternate, aliases)
    pub fn name_variants(&self) -> impl Iterator<Item = &str> {
        self.name
            .iter()
            .chain(self.alternative_name.iter())
            .chain(self.aliases.iter())
            .map(String::as_str)
    }

    pub fn has_usable_name(&self) -> bool {
        self.display_name().is_some()
    }

    /// First non-blank name variant
    pub fn display_name(&self) -> Option<&str> {
        self.name_variants()
            .map(str::trim)
            .find(|n| !n.is_empty())
    }
}

/// A single piece of visual evidence for a title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageAsset {
    pub url: String,
    pub preview_url: Option<String>,
    /// Coarse content tag, e.g. "still" or "screenshot"
    pub kind: String,
}

impl ImageAsset {
    pub fn new(url: &str, kind: &str) -> Self {
        Self {
            url: url.to_string(),
            preview_url: None,
            kind: kind.to_string(),
        }
    }
}

/// Outcome record of one revealed round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub candidate_id: CandidateId,
    pub title: String,
    pub poster_url: Option<String>,
    pub correct: bool,
    /// ISO timestamp of the reveal
    #[serde(default)]
    pub played_at: Option<String>,
}

/// What the player sees once a round is revealed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuessOutcome {
    pub correct: bool,
    pub guess: String,
    pub title: String,
    pub candidate_id: CandidateId,
    pub poster_url: Option<String>,
    pub streak: u32,
}

/// Cast/crew clues derived from cached title details
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Hint {
    pub year: Option<u32>,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub actors: Vec<String>,
}
