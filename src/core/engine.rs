use std::sync::Arc;

use thiserror::Error;

use crate::core::aggregator::{round2, CompatibilityAggregator};
use crate::core::classifier::{feature_vector, MatchClassifier};
use crate::core::lifecycle::MatchStateMachine;
use crate::core::metadata::MetadataAnalyzer;
use crate::core::stats::StatisticsAggregator;
use crate::models::{
    CompatibilityResult, Engagement, MatchPartner, MatchStatistics, Profile, RelationshipEdge,
    ScoreBand, ScoringWeights,
};
use crate::services::cache::{CacheKey, CacheManager};
use crate::services::store::{ProfileStore, RelationshipStore, StoreError};

/// Engine-level error taxonomy
///
/// Queries degrade instead of surfacing storage failures; mutations surface
/// them, since silently dropping a like or accept is unacceptable.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("trained model unavailable")]
    ModelUnavailable,

    #[error("computation failed: {0}")]
    Computation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Result of a like action
#[derive(Debug, Clone, Copy)]
pub struct LikeOutcome {
    pub created: bool,
    pub mutual: bool,
}

/// Ranked scoring output, with a degradation marker for cached fallbacks
#[derive(Debug, Clone)]
pub struct ScoredCandidates {
    pub results: Vec<CompatibilityResult>,
    pub total_candidates: usize,
    pub degraded: bool,
}

/// Scoring strategy, decided once per query
enum Scorer<'a> {
    Learned(&'a MatchClassifier),
    Deterministic,
}

/// The matching engine: one explicit service object owning both scoring
/// paths and the relationship lifecycle
///
/// Constructed once at startup and passed by reference into request
/// handlers. The trained classifier is optional; when absent every query
/// takes the deterministic aggregator path.
pub struct Engine<P, R> {
    profiles: Arc<P>,
    analyzer: MetadataAnalyzer,
    classifier: Option<MatchClassifier>,
    aggregator: CompatibilityAggregator,
    lifecycle: MatchStateMachine<R>,
    statistics: StatisticsAggregator<P, R>,
    cache: Option<Arc<CacheManager>>,
    candidate_multiplier: usize,
}

impl<P: ProfileStore, R: RelationshipStore> Engine<P, R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profiles: Arc<P>,
        edges: Arc<R>,
        analyzer: MetadataAnalyzer,
        classifier: Option<MatchClassifier>,
        weights: ScoringWeights,
        band: ScoreBand,
        cache: Option<Arc<CacheManager>>,
        candidate_multiplier: usize,
    ) -> Self {
        let classifier = match classifier {
            Some(c) if c.is_fitted() => Some(c),
            Some(_) => {
                tracing::warn!("ignoring unfitted classifier, deterministic scoring only");
                None
            }
            None => None,
        };

        Self {
            profiles: profiles.clone(),
            analyzer,
            classifier,
            aggregator: CompatibilityAggregator::new(weights, band),
            lifecycle: MatchStateMachine::new(edges.clone()),
            statistics: StatisticsAggregator::new(profiles, edges),
            cache,
            candidate_multiplier: candidate_multiplier.max(1),
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    fn select_scorer(&self) -> Scorer<'_> {
        match &self.classifier {
            Some(classifier) => Scorer::Learned(classifier),
            None => {
                tracing::warn!("trained model unavailable, falling back to aggregator");
                Scorer::Deterministic
            }
        }
    }

    /// Score candidates for a requester, ranked best-first
    ///
    /// Explicit candidate ids are honored when given; otherwise the profile
    /// store is asked for candidates. Storage failures degrade to the last
    /// cached result (or an empty one) instead of propagating; a missing
    /// requester is the only hard error.
    pub async fn score_candidates(
        &self,
        requester_id: &str,
        candidate_ids: &[String],
        limit: usize,
    ) -> Result<ScoredCandidates, EngineError> {
        let requester = match self.profiles.get_profile(requester_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                return Err(EngineError::NotFound(format!("profile {}", requester_id)))
            }
            Err(e) => {
                tracing::error!(user = requester_id, "profile lookup failed: {}", e);
                return Ok(self.degraded_results(requester_id).await);
            }
        };

        let requester_insights = self.analyzer.analyze(&requester);
        if let Err(e) = self
            .profiles
            .persist_insights(requester_id, &requester_insights)
            .await
        {
            tracing::warn!(user = requester_id, "failed to persist insights: {}", e);
        }

        let candidates = match self.collect_candidates(requester_id, candidate_ids, limit).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(user = requester_id, "candidate query failed: {}", e);
                return Ok(self.degraded_results(requester_id).await);
            }
        };
        let total_candidates = candidates.len();

        // Scoring is pure from here on; one strategy decision per query.
        let mut results: Vec<CompatibilityResult> = candidates
            .iter()
            .map(|candidate| self.aggregator.score(&requester, candidate))
            .collect();

        if let Scorer::Learned(classifier) = self.select_scorer() {
            let vectors: Vec<Vec<f64>> = candidates
                .iter()
                .map(|candidate| {
                    feature_vector(
                        &requester,
                        &requester_insights,
                        candidate,
                        &self.analyzer.analyze(candidate),
                    )
                })
                .collect();

            for (result, probability) in results.iter_mut().zip(classifier.predict_proba(&vectors))
            {
                result.score = round2(probability);
            }
        }

        rank_results(&mut results);
        results.truncate(limit);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&CacheKey::scores(requester_id), &results).await {
                tracing::warn!(user = requester_id, "failed to cache scores: {}", e);
            }
        }

        tracing::info!(
            user = requester_id,
            returned = results.len(),
            candidates = total_candidates,
            "scored candidates"
        );

        Ok(ScoredCandidates {
            results,
            total_candidates,
            degraded: false,
        })
    }

    async fn collect_candidates(
        &self,
        requester_id: &str,
        candidate_ids: &[String],
        limit: usize,
    ) -> Result<Vec<Profile>, StoreError> {
        if candidate_ids.is_empty() {
            return self
                .profiles
                .list_candidates(requester_id, limit * self.candidate_multiplier)
                .await;
        }

        let mut candidates = Vec::with_capacity(candidate_ids.len());
        for id in candidate_ids {
            if id == requester_id {
                continue;
            }
            match self.profiles.get_profile(id).await? {
                Some(profile) => candidates.push(profile),
                None => tracing::debug!(candidate = %id, "skipping unknown candidate"),
            }
        }
        Ok(candidates)
    }

    async fn degraded_results(&self, requester_id: &str) -> ScoredCandidates {
        if let Some(cache) = &self.cache {
            if let Ok(results) = cache
                .get::<Vec<CompatibilityResult>>(&CacheKey::scores(requester_id))
                .await
            {
                tracing::warn!(user = requester_id, "serving cached scores after storage failure");
                return ScoredCandidates {
                    total_candidates: results.len(),
                    results,
                    degraded: true,
                };
            }
        }

        tracing::warn!(user = requester_id, "no cached scores, returning empty result");
        ScoredCandidates {
            results: Vec::new(),
            total_candidates: 0,
            degraded: true,
        }
    }

    /// Record a like from one profile to another
    ///
    /// Captures the current compatibility score on the edge. A completed
    /// mutual pair triggers statistics recomputation for both participants.
    pub async fn like(&self, from: &str, to: &str) -> Result<LikeOutcome, EngineError> {
        let (user, target) = self.require_pair(from, to).await?;

        let score = self.score_pair(&user, &target);
        let outcome = self.lifecycle.propose(from, to, score).await?;

        if outcome.mutual {
            self.statistics.recompute(from).await;
            self.statistics.recompute(to).await;
            self.invalidate_scores(from).await;
            self.invalidate_scores(to).await;
        }

        Ok(LikeOutcome {
            created: outcome.created,
            mutual: outcome.mutual,
        })
    }

    /// Record an explicit pass (negative interaction)
    pub async fn pass(&self, from: &str, to: &str) -> Result<(RelationshipEdge, bool), EngineError> {
        self.require_pair(from, to).await?;
        self.lifecycle.pass(from, to).await
    }

    pub async fn accept(&self, from: &str, to: &str) -> Result<RelationshipEdge, EngineError> {
        self.lifecycle.accept(from, to).await
    }

    pub async fn reject(&self, from: &str, to: &str) -> Result<RelationshipEdge, EngineError> {
        self.lifecycle.reject(from, to).await
    }

    /// Mutually accepted partners, newest first
    pub async fn list_matches(&self, user_id: &str) -> Result<Vec<MatchPartner>, EngineError> {
        Ok(self.statistics_edges().accepted_partners(user_id).await?)
    }

    /// Recompute and persist statistics; never fails, per the statistics
    /// aggregator's contract
    pub async fn statistics(&self, user_id: &str) -> (MatchStatistics, Option<Engagement>) {
        let statistics = self.statistics.recompute(user_id).await;

        let engagement = match self.profiles.get_profile(user_id).await {
            Ok(Some(profile)) => Some(self.analyzer.analyze(&profile).engagement),
            _ => None,
        };

        (statistics, engagement)
    }

    fn statistics_edges(&self) -> &Arc<R> {
        self.lifecycle.store()
    }

    fn score_pair(&self, user: &Profile, target: &Profile) -> f64 {
        match self.select_scorer() {
            Scorer::Learned(classifier) => {
                let vector = feature_vector(
                    user,
                    &self.analyzer.analyze(user),
                    target,
                    &self.analyzer.analyze(target),
                );
                round2(
                    classifier
                        .predict_proba(std::slice::from_ref(&vector))
                        .first()
                        .copied()
                        .unwrap_or(0.0),
                )
            }
            Scorer::Deterministic => self.aggregator.score(user, target).score,
        }
    }

    async fn require_pair(&self, from: &str, to: &str) -> Result<(Profile, Profile), EngineError> {
        let user = self
            .profiles
            .get_profile(from)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("profile {}", from)))?;
        let target = self
            .profiles
            .get_profile(to)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("profile {}", to)))?;
        Ok((user, target))
    }

    async fn invalidate_scores(&self, user_id: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(&CacheKey::scores(user_id)).await {
                tracing::warn!(user = user_id, "failed to invalidate score cache: {}", e);
            }
        }
    }
}

/// Rank descending by score, ties broken by descending common-interest
/// count, then id for a stable order
pub(crate) fn rank_results(results: &mut [CompatibilityResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.common_interests.len().cmp(&a.common_interests.len()))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComponentScores;
    use crate::services::memory::MemoryStore;

    fn profile(id: &str, age: u8, interests: &[&str]) -> Profile {
        let mut p = Profile::new(id);
        p.age = Some(age);
        p.interests = interests.iter().map(|s| s.to_string()).collect();
        p
    }

    fn engine(store: Arc<MemoryStore>) -> Engine<MemoryStore, MemoryStore> {
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

    fn result(id: &str, score: f64, common: &[&str]) -> CompatibilityResult {
        CompatibilityResult {
            user_id: id.to_string(),
            score,
            components: ComponentScores {
                interest: 0.0,
                location: 0.0,
                age: 0.0,
                personality: 0.0,
            },
            common_interests: common.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_rank_breaks_ties_on_common_interests() {
        let mut results = vec![
            result("low", 0.5, &[]),
            result("tie-few", 0.7, &["a"]),
            result("tie-many", 0.7, &["a", "b", "c"]),
            result("top", 0.9, &[]),
        ];

        rank_results(&mut results);

        let order: Vec<&str> = results.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(order, vec!["top", "tie-many", "tie-few", "low"]);
    }

    #[tokio::test]
    async fn test_score_candidates_ranked_and_limited() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile("me", 30, &["travel", "music", "art"]));
        store.insert_profile(profile("close", 30, &["travel", "music", "art"]));
        store.insert_profile(profile("partial", 33, &["travel"]));
        store.insert_profile(profile("stranger", 55, &[]));

        let engine = engine(store);
        let scored = engine.score_candidates("me", &[], 2).await.unwrap();

        assert_eq!(scored.results.len(), 2);
        assert!(!scored.degraded);
        assert_eq!(scored.total_candidates, 3);
        assert_eq!(scored.results[0].user_id, "close");
        assert!(scored.results[0].score >= scored.results[1].score);
    }

    #[tokio::test]
    async fn test_score_candidates_explicit_ids_skip_unknown() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile("me", 30, &["travel"]));
        store.insert_profile(profile("a", 31, &["travel"]));

        let engine = engine(store);
        let scored = engine
            .score_candidates(
                "me",
                &["a".to_string(), "ghost".to_string(), "me".to_string()],
                10,
            )
            .await
            .unwrap();

        assert_eq!(scored.results.len(), 1);
        assert_eq!(scored.results[0].user_id, "a");
    }

    #[tokio::test]
    async fn test_score_candidates_unknown_requester() {
        let engine = engine(Arc::new(MemoryStore::new()));
        let err = engine.score_candidates("ghost", &[], 5).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_like_flow_detects_mutual() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile("a", 30, &["travel"]));
        store.insert_profile(profile("b", 31, &["travel"]));

        let engine = engine(store.clone());

        let first = engine.like("a", "b").await.unwrap();
        assert!(first.created);
        assert!(!first.mutual);

        let second = engine.like("b", "a").await.unwrap();
        assert!(second.created);
        assert!(second.mutual);

        // Duplicate like is informational
        let third = engine.like("a", "b").await.unwrap();
        assert!(!third.created);
        assert!(third.mutual);
    }

    #[tokio::test]
    async fn test_like_unknown_target_is_error() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile("a", 30, &[]));

        let engine = engine(store);
        let err = engine.like("a", "ghost").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_like_captures_aggregator_score_on_edge() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile("a", 30, &["travel", "music"]));
        store.insert_profile(profile("b", 33, &["travel", "art"]));

        let engine = engine(store.clone());
        engine.like("a", "b").await.unwrap();

        let edge = store.get_edge("a", "b").await.unwrap().unwrap();
        // Worked example: raw 0.4743, inside the band
        assert_eq!(edge.score, 0.47);
    }

    #[tokio::test]
    async fn test_statistics_after_mutual_match() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile("a", 30, &["travel"]));
        store.insert_profile(profile("b", 31, &["travel"]));
        store.insert_profile(profile("c", 32, &["travel"]));

        let engine = engine(store);
        engine.like("a", "b").await.unwrap();
        engine.like("b", "a").await.unwrap();
        engine.like("a", "c").await.unwrap();

        let (statistics, engagement) = engine.statistics("a").await;
        assert_eq!(statistics.likes_sent, 2);
        assert_eq!(statistics.mutual_matches, 1);
        assert_eq!(statistics.match_rate, 0.5);
        assert_eq!(engagement, Some(Engagement::Low));
    }

    #[tokio::test]
    async fn test_list_matches_only_mutual() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile("a", 30, &["travel"]));
        store.insert_profile(profile("b", 31, &["travel"]));
        store.insert_profile(profile("c", 32, &["travel"]));

        let engine = engine(store);
        engine.like("a", "b").await.unwrap();
        engine.like("b", "a").await.unwrap();
        engine.like("a", "c").await.unwrap();

        let matches = engine.list_matches("a").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].user_id, "b");
    }

    #[tokio::test]
    async fn test_learned_scorer_overrides_overall_score() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile("me", 30, &["travel"]));
        store.insert_profile(profile("twin", 30, &["travel"]));
        store.insert_profile(profile("distant", 50, &[]));

        let mut classifier = MatchClassifier::new();
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let wiggle = (i % 4) as f64 * 0.01;
            features.push(vec![1.0 + wiggle, 0.8 - wiggle, 0.0, 0.0, 0.0]);
            labels.push(true);
            features.push(vec![19.0 + wiggle, 0.0 + wiggle, 0.0, 0.0, 0.0]);
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

        let scored = engine.score_candidates("me", &[], 10).await.unwrap();
        assert_eq!(scored.results[0].user_id, "twin");
        // Learned scores are probabilities, not band-clamped
        assert!(scored.results[0].score > 0.8);
        assert!(scored.results[1].score < 0.2);
        // Component breakdown stays available for explainability
        assert_eq!(scored.results[0].components.interest, 1.0);
    }
}
