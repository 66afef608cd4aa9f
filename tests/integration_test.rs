use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use framequiz::catalog::{CatalogError, InMemoryCatalog, ScriptedProber};
use framequiz::protocol::{ClientMessage, ServerMessage};
use framequiz::state::{GameEngine, HISTORY_KEY};
use framequiz::storage::MemoryStore;
use framequiz::types::{Candidate, EngineConfig, HistoryEntry, ImageAsset, Person, RoundPhase};
use framequiz::ws::handlers::handle_message;
use std::collections::HashSet;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

fn stills(prefix: &str, count: usize) -> Vec<ImageAsset> {
    (0..count)
        .map(|i| ImageAsset::new(&format!("http://img/{}/{}.jpg", prefix, i), "still"))
        .collect()
}

fn numbered_title(id: u64) -> Candidate {
    Candidate::new(id, &format!("Title {}", id))
}

struct Harness {
    engine: GameEngine,
    catalog: Arc<InMemoryCatalog>,
    prober: Arc<ScriptedProber>,
    store: Arc<MemoryStore>,
}

impl Harness {
    fn new(catalog: InMemoryCatalog) -> Self {
        let catalog = Arc::new(catalog);
        let prober = Arc::new(ScriptedProber::new());
        let store = Arc::new(MemoryStore::new());
        let engine = GameEngine::new(
            catalog.clone(),
            prober.clone(),
            store.clone(),
            EngineConfig {
                seed: Some(2024),
                ..EngineConfig::default()
            },
        );
        Self {
            engine,
            catalog,
            prober,
            store,
        }
    }

    async fn send(&self, msg: ClientMessage) -> Option<ServerMessage> {
        handle_message(msg, &self.engine).await
    }

    async fn start_round(&self) {
        let response = self.send(ClientMessage::StartNewRound).await;
        assert!(response.is_none(), "unexpected response {:?}", response);
        self.engine.wait_for_background().await;
        assert_eq!(self.engine.phase().await, RoundPhase::Playing);
    }

    async fn guess(&self, text: &str) -> (bool, u32) {
        match self
            .send(ClientMessage::SubmitGuess {
                text: text.to_string(),
            })
            .await
        {
            Some(ServerMessage::GuessResult { outcome }) => (outcome.correct, outcome.streak),
            other => panic!("Expected GuessResult, got {:?}", other),
        }
    }
}

fn error_code(response: Option<ServerMessage>) -> String {
    match response {
        Some(ServerMessage::Error { code, .. }) => code,
        other => panic!("Expected Error message, got {:?}", other),
    }
}

/// End-to-end flow: load, hint, guess, reveal, next round
#[tokio::test]
async fn test_full_game_flow() {
    let inception = Candidate {
        alternative_name: Some(String::new()),
        aliases: vec!["Начало".to_string()],
        year: Some(2010),
        poster_url: Some("http://img/inception/poster.jpg".to_string()),
        genres: vec!["sci-fi".to_string()],
        persons: vec![Person {
            name: Some("Christopher Nolan".to_string()),
            en_name: None,
            profession: Some("director".to_string()),
        }],
        ..Candidate::new(447301, "Inception")
    };
    let harness = Harness::new(
        InMemoryCatalog::new()
            .with_title(inception, stills("inception", 9))
            .with_title(Candidate::new(2, "Heat"), stills("heat", 9)),
    );
    let mut rx = harness.engine.subscribe();

    // 1. Nothing is playing yet
    assert_eq!(
        error_code(harness.send(ClientMessage::RequestHint).await),
        "NO_ACTIVE_TITLE"
    );

    // 2. First round
    harness.start_round().await;
    let snapshot = harness.engine.snapshot().await;
    assert_eq!(snapshot.round_no, 1);
    assert_eq!(snapshot.images.len(), 5);
    assert!(snapshot.outcome.is_none());

    // Phase changes were broadcast
    let mut saw_playing = false;
    while let Ok(msg) = rx.try_recv() {
        if let ServerMessage::State { snapshot } = msg {
            saw_playing |= snapshot.phase == RoundPhase::Playing;
        }
    }
    assert!(saw_playing, "Playing state should be broadcast");

    // 3. Hint reads the cached details
    match harness.send(ClientMessage::RequestHint).await {
        Some(ServerMessage::Hint { hint }) => {
            assert_eq!(hint.year, Some(2010));
            assert_eq!(hint.directors, vec!["Christopher Nolan"]);
        }
        other => panic!("Expected Hint, got {:?}", other),
    }

    // 4. A new round can't be started mid-round
    assert_eq!(
        error_code(harness.send(ClientMessage::StartNewRound).await),
        "WRONG_PHASE"
    );

    // 5. Guess by localized alias
    assert_eq!(harness.guess(" НАЧАЛО ").await, (true, 1));
    let snapshot = harness.engine.snapshot().await;
    assert_eq!(snapshot.phase, RoundPhase::Revealed);
    let outcome = snapshot.outcome.expect("Revealed round should carry the outcome");
    assert_eq!(outcome.title, "Inception");
    assert_eq!(
        outcome.poster_url.as_deref(),
        Some("http://img/inception/poster.jpg")
    );

    // A second guess is refused
    assert_eq!(
        error_code(
            harness
                .send(ClientMessage::SubmitGuess {
                    text: "Inception".to_string()
                })
                .await
        ),
        "WRONG_PHASE"
    );

    // 6. Next round picks the other title and a wrong guess resets the streak
    harness.start_round().await;
    assert_eq!(harness.engine.snapshot().await.round_no, 2);
    assert_eq!(harness.guess("Ronin").await, (false, 0));

    let history = harness.engine.history().await;
    let ids: Vec<_> = history.iter().map(|e| e.candidate_id).collect();
    assert_eq!(ids, vec![2, 447301]);
    assert!(history.iter().all(|e| e.played_at.is_some()));
}

#[tokio::test]
async fn test_streak_follows_consecutive_correct_guesses() {
    let mut catalog = InMemoryCatalog::new();
    for id in 1..=4 {
        catalog = catalog.with_title(numbered_title(id), stills(&id.to_string(), 2));
    }
    let harness = Harness::new(catalog);

    let mut streaks = Vec::new();
    for (id, correct) in [(1, true), (2, true), (3, false), (4, true)] {
        harness.start_round().await;
        let text = if correct {
            format!("title {}", id)
        } else {
            "nope".to_string()
        };
        let (was_correct, streak) = harness.guess(&text).await;
        assert_eq!(was_correct, correct);
        streaks.push(streak);
    }

    assert_eq!(streaks, vec![1, 2, 0, 1]);
    assert_eq!(harness.engine.streak().await, 1);
}

#[tokio::test]
async fn test_history_is_capped_and_persisted() {
    let mut catalog = InMemoryCatalog::new();
    for id in 1..=25 {
        catalog = catalog.with_title(numbered_title(id), stills(&id.to_string(), 1));
    }
    let harness = Harness::new(catalog);

    for _ in 0..25 {
        harness.start_round().await;
        harness.guess("?").await;
        assert!(harness.engine.history().await.len() <= 20);
    }

    let history = harness.engine.history().await;
    assert_eq!(history.len(), 20);
    assert_eq!(history[0].candidate_id, 25);
    assert_eq!(history[19].candidate_id, 6);

    let raw = harness.store.raw(HISTORY_KEY).expect("History should be persisted");
    let stored: Vec<HistoryEntry> = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored, history);
}

#[tokio::test]
async fn test_recent_titles_are_not_resampled() {
    let mut catalog = InMemoryCatalog::new();
    for id in 1..=3 {
        catalog = catalog.with_title(numbered_title(id), stills(&id.to_string(), 1));
    }
    let harness = Harness::new(catalog);

    let mut seen = Vec::new();
    for _ in 0..3 {
        harness.start_round().await;
        harness.guess("?").await;
        seen.push(harness.engine.history().await[0].candidate_id);
    }
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 3);

    // Every title is now recent: sampling gives up and the round stalls
    assert!(harness.send(ClientMessage::StartNewRound).await.is_none());
    harness.engine.wait_for_background().await;
    let snapshot = harness.engine.snapshot().await;
    assert_eq!(snapshot.phase, RoundPhase::Loading);
    assert!(snapshot.stalled);
}

#[tokio::test]
async fn test_lockout_halts_all_catalog_work() {
    let harness = Harness::new(
        InMemoryCatalog::new()
            .with_title(numbered_title(1), stills("1", 6))
            .with_title(numbered_title(2), stills("2", 6)),
    );
    let mut rx = harness.engine.subscribe();

    harness.start_round().await;
    harness.guess("?").await;

    harness.catalog.set_outage(Some(CatalogError::Status {
        status: 403,
        message: "Forbidden".to_string(),
    }));
    assert!(harness.send(ClientMessage::StartNewRound).await.is_none());
    harness.engine.wait_for_background().await;
    assert!(harness.engine.is_locked_out());

    let random_calls = harness.catalog.random_calls();
    let image_calls = harness.catalog.image_calls();
    let probes = harness.prober.probe_count();

    // Further actions make no upstream calls
    harness.catalog.set_outage(None);
    assert_eq!(
        error_code(harness.send(ClientMessage::StartNewRound).await),
        "LOCKED_OUT"
    );
    harness
        .send(ClientMessage::ReportImageFailed {
            url: "http://img/1/0.jpg".to_string(),
        })
        .await;
    harness.engine.wait_for_background().await;

    assert_eq!(harness.catalog.random_calls(), random_calls);
    assert_eq!(harness.catalog.image_calls(), image_calls);
    assert_eq!(harness.prober.probe_count(), probes);
    assert!(harness.engine.snapshot().await.locked_out);

    let mut blocked = 0;
    while let Ok(msg) = rx.try_recv() {
        if matches!(msg, ServerMessage::Blocked { .. }) {
            blocked += 1;
        }
    }
    assert_eq!(blocked, 1);
}

#[tokio::test]
async fn test_reload_resolving_after_reveal_is_dropped() {
    let harness = Harness::new(
        InMemoryCatalog::new().with_title(numbered_title(1), stills("1", 12)),
    );
    harness.start_round().await;
    let shown = harness.engine.images().await;

    // Hold the reload inside its first probe
    harness.prober.pause();
    let probes = harness.prober.probe_count();
    harness
        .send(ClientMessage::ReportImageFailed {
            url: shown[0].url.clone(),
        })
        .await;
    for _ in 0..100 {
        if harness.prober.probe_count() > probes {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(harness.prober.probe_count() > probes, "Reload should be probing");

    let (correct, _) = harness.guess("title 1").await;
    assert!(correct);
    let revealed = harness.engine.snapshot().await;

    harness.prober.resume();
    harness.engine.wait_for_background().await;

    let after = harness.engine.snapshot().await;
    assert_eq!(after.phase, RoundPhase::Revealed);
    assert_eq!(after.images, shown);
    assert_eq!(after, revealed);
}

#[tokio::test]
async fn test_failed_urls_are_never_offered_again() {
    let harness = Harness::new(
        InMemoryCatalog::new().with_title(numbered_title(1), stills("1", 8)),
    );
    let broken = ["http://img/1/1.jpg", "http://img/1/4.jpg", "http://img/1/6.jpg"];
    for url in broken {
        harness.prober.mark_broken(url);
    }

    harness.start_round().await;
    let registry = harness.engine.failed_urls().snapshot().await;
    assert!(registry.iter().all(|url| broken.contains(&url.as_str())));
    let shown = harness.engine.images().await;
    assert!(shown.iter().all(|i| !broken.contains(&i.url.as_str())));

    // Reload after an in-round failure skips every known-bad URL
    let mut excluded = registry.clone();
    excluded.insert(shown[0].url.clone());
    let probes_before = harness.prober.probe_count();

    harness.engine.report_image_failed(&shown[0].url).await;
    harness.engine.wait_for_background().await;

    let registry = harness.engine.failed_urls().snapshot().await;
    assert!(registry.contains(&shown[0].url));
    let reload_probes = &harness.prober.probed()[probes_before..];
    assert!(!reload_probes.is_empty());
    assert!(reload_probes.iter().all(|url| !excluded.contains(url)));

    let reloaded = harness.engine.images().await;
    assert_eq!(reloaded.len(), 4);
    assert!(reloaded.iter().all(|i| !registry.contains(&i.url)));
}

#[tokio::test]
async fn test_http_api_serves_state_and_history() {
    let harness = Harness::new(
        InMemoryCatalog::new().with_title(numbered_title(1), stills("1", 3)),
    );
    harness.start_round().await;
    harness.guess("Title 1").await;

    let app = framequiz::build_router(Arc::new(harness.engine.clone()));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/state").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let state: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(state["phase"], "REVEALED");
    assert_eq!(state["streak"], 1);
    assert_eq!(state["outcome"]["title"], "Title 1");

    let response = app
        .oneshot(Request::builder().uri("/api/history").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let history: Vec<HistoryEntry> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].correct);
}
