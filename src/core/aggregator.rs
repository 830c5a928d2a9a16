use crate::core::features::{
    age_compatibility, common_interests, interest_similarity, location_compatibility,
    personality_compatibility,
};
use crate::models::{CompatibilityResult, ComponentScores, Profile, ScoreBand, ScoringWeights};

/// Deterministic, explainable compatibility scorer
///
/// Combines the four pairwise signals with fixed weights, then clamps the
/// weighted sum to the configured band. Clamping happens after weighting,
/// never per component, so the breakdown stays honest while the overall
/// score avoids 0% and 100% matches.
#[derive(Debug, Clone, Copy)]
pub struct CompatibilityAggregator {
    weights: ScoringWeights,
    band: ScoreBand,
}

impl CompatibilityAggregator {
    pub fn new(weights: ScoringWeights, band: ScoreBand) -> Self {
        Self { weights, band }
    }

    /// Score a pair of profiles with component breakdown and common interests
    pub fn score(&self, user: &Profile, candidate: &Profile) -> CompatibilityResult {
        let interest = interest_similarity(&user.interests, &candidate.interests);
        let location = location_compatibility(user, candidate);
        let age = age_compatibility(user.age, candidate.age);
        let personality = personality_compatibility(user, candidate);

        let raw = interest * self.weights.interest
            + location * self.weights.location
            + age * self.weights.age
            + personality * self.weights.personality;

        let overall = round2(self.band.clamp(raw));

        CompatibilityResult {
            user_id: candidate.id.clone(),
            score: overall,
            components: ComponentScores {
                interest: round2(interest),
                location: round2(location),
                age: round2(age),
                personality: round2(personality),
            },
            common_interests: common_interests(&user.interests, &candidate.interests),
        }
    }
}

impl Default for CompatibilityAggregator {
    fn default() -> Self {
        Self::new(ScoringWeights::default(), ScoreBand::default())
    }
}

#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, age: Option<u8>, interests: &[&str]) -> Profile {
        let mut p = Profile::new(id);
        p.age = age;
        p.interests = interests.iter().map(|s| s.to_string()).collect();
        p
    }

    #[test]
    fn test_score_worked_example() {
        // A: {travel, music}, age 30, no coordinates, no traits
        // B: {travel, art}, age 33
        let a = profile("a", Some(30), &["travel", "music"]);
        let b = profile("b", Some(33), &["travel", "art"]);

        let result = CompatibilityAggregator::default().score(&a, &b);

        // interest 1/3, location 0.5 default, age 0.91, personality 0.5 default
        assert_eq!(result.components.interest, 0.33);
        assert_eq!(result.components.location, 0.5);
        assert_eq!(result.components.age, 0.91);
        assert_eq!(result.components.personality, 0.5);
        // 0.3333*0.4 + 0.5*0.2 + 0.91*0.1 + 0.5*0.3 = 0.4743
        assert_eq!(result.score, 0.47);
        assert_eq!(result.common_interests, vec!["travel"]);
    }

    #[test]
    fn test_identical_profiles_clamp_to_ceiling() {
        let mut a = profile("a", Some(28), &["travel", "music"]);
        a.latitude = Some(40.7128);
        a.longitude = Some(-74.0060);
        a.personality.insert("openness".to_string(), 0.8);
        a.personality.insert("agreeableness".to_string(), 0.7);

        let mut b = a.clone();
        b.id = "b".to_string();

        let result = CompatibilityAggregator::default().score(&a, &b);

        // Raw weighted score is 1.0; never report a perfect match
        assert_eq!(result.score, 0.95);
    }

    #[test]
    fn test_degenerate_profiles_clamp_to_floor() {
        let a = Profile::new("a");
        let b = Profile::new("b");

        let result = CompatibilityAggregator::default().score(&a, &b);

        // interest 0.0, location/age/personality neutral -> raw 0.30
        assert_eq!(result.score, 0.40);
        assert!(result.common_interests.is_empty());
    }

    #[test]
    fn test_score_always_within_band() {
        let band = ScoreBand::default();
        let aggregator = CompatibilityAggregator::default();

        let cases = [
            (Profile::new("x"), Profile::new("y")),
            (
                profile("a", Some(20), &["a", "b", "c"]),
                profile("b", Some(60), &[]),
            ),
        ];

        for (a, b) in cases {
            let result = aggregator.score(&a, &b);
            assert!(result.score >= band.floor && result.score <= band.ceiling);
        }
    }
}
