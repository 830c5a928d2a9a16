// Unit tests for Ember Match

use std::sync::Arc;

use ember_match::core::aggregator::CompatibilityAggregator;
use ember_match::core::classifier::{MatchClassifier, FEATURE_COUNT};
use ember_match::core::features::{
    age_compatibility, interest_similarity, location_compatibility,
};
use ember_match::core::lifecycle::MatchStateMachine;
use ember_match::models::{EdgeStatus, Profile};
use ember_match::services::{MemoryStore, RelationshipStore};

fn profile(id: &str, age: Option<u8>, interests: &[&str]) -> Profile {
    let mut p = Profile::new(id);
    p.age = age;
    p.interests = interests.iter().map(|s| s.to_string()).collect();
    p
}

fn located(id: &str, lat: f64, lon: f64) -> Profile {
    let mut p = Profile::new(id);
    p.latitude = Some(lat);
    p.longitude = Some(lon);
    p
}

#[test]
fn test_interest_similarity_is_symmetric_and_bounded() {
    let sets: [&[&str]; 4] = [
        &["travel", "music"],
        &["travel", "art", "food"],
        &["gaming"],
        &[],
    ];

    for a in sets {
        for b in sets {
            let a: Vec<String> = a.iter().map(|s| s.to_string()).collect();
            let b: Vec<String> = b.iter().map(|s| s.to_string()).collect();

            let ab = interest_similarity(&a, &b);
            let ba = interest_similarity(&b, &a);

            assert_eq!(ab, ba);
            assert!((0.0..=1.0).contains(&ab));
            if a.is_empty() || b.is_empty() {
                assert_eq!(ab, 0.0);
            }
        }
    }
}

#[test]
fn test_location_compatibility_non_increasing_in_distance() {
    let origin = located("origin", 48.8566, 2.3522);

    let mut previous = f64::MAX;
    for step in 0..30 {
        let other = located("other", 48.8566 + step as f64 * 0.04, 2.3522);
        let score = location_compatibility(&origin, &other);

        assert!((0.1..=1.0).contains(&score));
        assert!(score <= previous + 1e-12, "score increased with distance");
        previous = score;
    }
}

#[test]
fn test_aggregator_band_holds_for_degenerate_profiles() {
    let aggregator = CompatibilityAggregator::default();

    let empty_a = Profile::new("a");
    let empty_b = Profile::new("b");
    let result = aggregator.score(&empty_a, &empty_b);
    assert!((0.40..=0.95).contains(&result.score));

    let mut rich = profile("rich", Some(30), &["travel", "music", "art"]);
    rich.latitude = Some(40.7);
    rich.longitude = Some(-74.0);
    let twin = Profile {
        id: "twin".to_string(),
        ..rich.clone()
    };
    let result = aggregator.score(&rich, &twin);
    assert!((0.40..=0.95).contains(&result.score));
}

#[test]
fn test_scenario_partial_overlap() {
    // A: {travel, music}, age 30, no coordinates; B: {travel, art}, age 33.
    // interest 1/3, location 0.5, age 0.91, personality 0.5 ->
    // 0.4743 weighted, inside the band.
    let a = profile("a", Some(30), &["travel", "music"]);
    let b = profile("b", Some(33), &["travel", "art"]);

    let result = CompatibilityAggregator::default().score(&a, &b);

    assert_eq!(result.components.interest, 0.33);
    assert_eq!(result.components.age, 0.91);
    assert_eq!(result.components.location, 0.5);
    assert_eq!(result.components.personality, 0.5);
    assert_eq!(result.score, 0.47);
    assert_eq!(result.common_interests, vec!["travel"]);
}

#[test]
fn test_scenario_identical_profiles_never_perfect() {
    let mut a = profile("a", Some(28), &["travel", "music"]);
    a.latitude = Some(40.7128);
    a.longitude = Some(-74.0060);
    a.personality.insert("openness".to_string(), 0.9);
    a.personality.insert("agreeableness".to_string(), 0.9);

    let b = Profile {
        id: "b".to_string(),
        ..a.clone()
    };

    let result = CompatibilityAggregator::default().score(&a, &b);
    assert_eq!(result.score, 0.95);
}

#[test]
fn test_age_compatibility_piecewise_bands() {
    assert!((age_compatibility(Some(30), Some(33)) - 0.91).abs() < 1e-9);
    assert_eq!(age_compatibility(Some(20), Some(60)), 0.2);
    assert_eq!(age_compatibility(None, None), 0.5);
}

#[tokio::test]
async fn test_propose_twice_single_edge() {
    let store = Arc::new(MemoryStore::new());
    let machine = MatchStateMachine::new(store.clone());

    let first = machine.propose("a", "b", 0.6).await.unwrap();
    let second = machine.propose("a", "b", 0.6).await.unwrap();

    assert!(first.created);
    assert!(!second.created);

    // Exactly one edge in storage
    let edges = store.edges_from("a").await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].status, EdgeStatus::Pending);
}

#[tokio::test]
async fn test_mutual_match_order_independent() {
    for (first, second) in [(("a", "b"), ("b", "a")), (("b", "a"), ("a", "b"))] {
        let store = Arc::new(MemoryStore::new());
        let machine = MatchStateMachine::new(store.clone());

        machine.propose(first.0, first.1, 0.5).await.unwrap();
        let outcome = machine.propose(second.0, second.1, 0.5).await.unwrap();
        assert!(outcome.mutual);

        for (from, to) in [("a", "b"), ("b", "a")] {
            let edge = store.get_edge(from, to).await.unwrap().unwrap();
            assert_eq!(edge.status, EdgeStatus::Accepted);
            assert!(edge.accepted_at.is_some());
        }
    }
}

#[tokio::test]
async fn test_accept_missing_edge_is_error() {
    let store = Arc::new(MemoryStore::new());
    let machine = MatchStateMachine::new(store.clone());

    assert!(machine.accept("a", "b").await.is_err());
    assert!(store.get_edge("a", "b").await.unwrap().is_none());
}

#[test]
fn test_unfitted_classifier_returns_neutral_batch() {
    let classifier = MatchClassifier::new();
    let batch = vec![vec![0.5; FEATURE_COUNT]; 7];

    let probabilities = classifier.predict_proba(&batch);

    assert_eq!(probabilities.len(), batch.len());
    assert!(probabilities.iter().all(|&p| p == 0.0));
}
