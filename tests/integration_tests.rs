// Integration tests for Ember Match
//
// Exercise the engine end-to-end against the in-memory stores: scoring,
// like/accept/reject lifecycle, statistics and the learned-vs-deterministic
// strategy selection.

use std::sync::Arc;

use ember_match::core::classifier::MatchClassifier;
use ember_match::core::{Engine, EngineError, MetadataAnalyzer};
use ember_match::models::{Profile, ScoreBand, ScoringWeights};
use ember_match::services::MemoryStore;

fn profile(id: &str, age: u8, interests: &[&str], coords: Option<(f64, f64)>) -> Profile {
    let mut p = Profile::new(id);
    p.age = Some(age);
    p.interests = interests.iter().map(|s| s.to_string()).collect();
    if let Some((lat, lon)) = coords {
        p.latitude = Some(lat);
        p.longitude = Some(lon);
    }
    p
}

fn deterministic_engine(store: Arc<MemoryStore>) -> Engine<MemoryStore, MemoryStore> {
    Engine::new(
        store.clone(),
        store,
        MetadataAnalyzer::default(),
        None,
        ScoringWeights::default(),
        ScoreBand::default(),
        None,
        5,
    )
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let nyc = Some((40.7128, -74.0060));
    store.insert_profile(profile("alice", 30, &["travel", "music", "art"], nyc));
    store.insert_profile(profile("bob", 31, &["travel", "music"], nyc));
    store.insert_profile(profile("carol", 33, &["travel"], Some((40.8, -74.1))));
    store.insert_profile(profile("dan", 52, &["chess"], Some((51.5, -0.13))));
    store
}

#[tokio::test]
async fn test_end_to_end_scoring_ranks_by_affinity() {
    let engine = deterministic_engine(seeded_store());

    let scored = engine.score_candidates("alice", &[], 10).await.unwrap();

    assert_eq!(scored.total_candidates, 3);
    assert!(!scored.degraded);

    let order: Vec<&str> = scored.results.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(order[0], "bob");
    assert_eq!(*order.last().unwrap(), "dan");

    // Ranked descending throughout
    for pair in scored.results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // Every deterministic score stays inside the band
    for result in &scored.results {
        assert!((0.40..=0.95).contains(&result.score));
    }
}

#[tokio::test]
async fn test_scoring_explicit_candidates() {
    let engine = deterministic_engine(seeded_store());

    let scored = engine
        .score_candidates("alice", &["dan".to_string(), "bob".to_string()], 10)
        .await
        .unwrap();

    let ids: Vec<&str> = scored.results.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(ids, vec!["bob", "dan"]);
}

#[tokio::test]
async fn test_like_accept_reject_lifecycle() {
    let store = seeded_store();
    let engine = deterministic_engine(store.clone());

    // alice likes bob: pending
    let outcome = engine.like("alice", "bob").await.unwrap();
    assert!(outcome.created && !outcome.mutual);

    // bob likes alice back: mutual, both accepted
    let outcome = engine.like("bob", "alice").await.unwrap();
    assert!(outcome.mutual);

    let matches = engine.list_matches("alice").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].user_id, "bob");

    // carol likes alice; alice rejects the edge she then creates via accept path
    engine.like("carol", "alice").await.unwrap();
    let edge = engine.reject("carol", "alice").await.unwrap();
    assert_eq!(edge.status, ember_match::EdgeStatus::Rejected);

    // rejecting an accepted edge un-matches that direction
    let edge = engine.reject("alice", "bob").await.unwrap();
    assert_eq!(edge.status, ember_match::EdgeStatus::Rejected);
    assert!(engine.list_matches("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_statistics_reflect_graph() {
    let engine = deterministic_engine(seeded_store());

    engine.like("alice", "bob").await.unwrap();
    engine.like("bob", "alice").await.unwrap();
    engine.like("alice", "carol").await.unwrap();
    engine.pass("alice", "dan").await.unwrap();
    engine.like("dan", "alice").await.unwrap();

    let (stats, engagement) = engine.statistics("alice").await;

    assert_eq!(stats.likes_sent, 2);
    assert_eq!(stats.dislikes_sent, 1);
    assert_eq!(stats.mutual_matches, 1);
    // dan liked alice but alice already passed on him: resolved
    assert_eq!(stats.incoming_likes, 0);
    assert_eq!(stats.match_rate, 0.5);
    assert!(stats.error.is_none());
    assert!(engagement.is_some());
}

#[tokio::test]
async fn test_mutation_on_unknown_profile_is_not_found() {
    let engine = deterministic_engine(seeded_store());

    let err = engine.like("alice", "nobody").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = engine.accept("alice", "nobody").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_learned_path_used_when_model_present() {
    let store = seeded_store();

    let mut classifier = MatchClassifier::new();
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..25 {
        let wiggle = (i % 5) as f64 * 0.02;
        features.push(vec![1.0 + wiggle, 0.7 - wiggle, 0.05, 0.05, 1.0]);
        labels.push(true);
        features.push(vec![20.0 - wiggle, 0.02 + wiggle, 0.7, 0.6, 0.0]);
        labels.push(false);
    }
    classifier.fit(&features, &labels).unwrap();

    let engine = Engine::new(
        store.clone(),
        store,
        MetadataAnalyzer::default(),
        Some(classifier),
        ScoringWeights::default(),
        ScoreBand::default(),
        None,
        5,
    );

    assert!(engine.model_loaded());

    let scored = engine.score_candidates("alice", &[], 10).await.unwrap();

    // Probabilities may leave the deterministic band
    assert!(scored.results.iter().any(|r| r.score > 0.95 || r.score < 0.40));
    // The component breakdown is still the deterministic one
    for result in &scored.results {
        assert!((0.0..=1.0).contains(&result.components.interest));
    }
}

#[tokio::test]
async fn test_deterministic_fallback_without_model() {
    let engine = deterministic_engine(seeded_store());
    assert!(!engine.model_loaded());

    // Queries keep working, just on the aggregator path
    let scored = engine.score_candidates("alice", &[], 10).await.unwrap();
    assert!(!scored.results.is_empty());
}
