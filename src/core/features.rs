use std::collections::HashSet;

use crate::core::distance::haversine_distance;
use crate::models::Profile;

/// Neutral default used when a signal cannot be computed from the inputs
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Distance at which location compatibility bottoms out
const MAX_DISTANCE_KM: f64 = 100.0;

/// Per-trait compatibility factor (how strongly a shared trait level counts)
const TRAIT_FACTORS: [(&str, f64); 5] = [
    ("openness", 0.8),
    ("conscientiousness", 0.8),
    ("extroversion", 0.6),
    ("agreeableness", 0.9),
    ("neuroticism", 0.2),
];

/// Jaccard similarity of the two interest sets
///
/// Returns 0.0 when either side has no interests.
pub fn interest_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    if union == 0 {
        return 0.0;
    }

    intersection as f64 / union as f64
}

/// Interests present in both profiles, in the first profile's order
pub fn common_interests(a: &[String], b: &[String]) -> Vec<String> {
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    a.iter()
        .filter(|interest| set_b.contains(interest.as_str()) && seen.insert(interest.as_str()))
        .cloned()
        .collect()
}

/// Location compatibility from great-circle distance
///
/// 1.0 at zero distance, decaying linearly and flooring at 0.1 from 100 km
/// outward. Missing coordinates on either side yield the neutral default.
pub fn location_compatibility(a: &Profile, b: &Profile) -> f64 {
    let (Some((lat_a, lon_a)), Some((lat_b, lon_b))) = (a.coordinates(), b.coordinates()) else {
        return NEUTRAL_SCORE;
    };

    let distance = haversine_distance(lat_a, lon_a, lat_b, lon_b);
    (1.0 - (distance / MAX_DISTANCE_KM).min(0.9)).max(0.1)
}

/// Age compatibility, a piecewise function of the absolute age difference
///
/// 0-3 years maps to 1.0-0.91, 4-7 to 0.8-0.65, 8-15 to 0.5-0.325,
/// anything beyond 15 to a flat 0.2. Missing age yields the neutral default.
pub fn age_compatibility(a: Option<u8>, b: Option<u8>) -> f64 {
    let (Some(age_a), Some(age_b)) = (a, b) else {
        return NEUTRAL_SCORE;
    };

    let diff = (i16::from(age_a) - i16::from(age_b)).unsigned_abs() as f64;

    if diff <= 3.0 {
        1.0 - diff * 0.03
    } else if diff <= 7.0 {
        0.8 - (diff - 4.0) * 0.05
    } else if diff <= 15.0 {
        0.5 - (diff - 8.0) * 0.025
    } else {
        0.2
    }
}

/// Personality compatibility over the Big Five traits
///
/// Each trait present on both sides contributes `(1 - |a - b|)` scaled by the
/// trait's compatibility factor, weighted by how far the first profile's
/// value sits from neutral (extreme traits count more). The result is the
/// weighted average over matched traits, or the neutral default when no
/// trait is shared.
pub fn personality_compatibility(a: &Profile, b: &Profile) -> f64 {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for (trait_name, factor) in TRAIT_FACTORS {
        let (Some(&value_a), Some(&value_b)) =
            (a.personality.get(trait_name), b.personality.get(trait_name))
        else {
            continue;
        };

        let similarity = 1.0 - (value_a - value_b).abs();
        let extremity = 0.5 + (value_a - 0.5).abs();

        weighted_sum += similarity * factor * extremity;
        total_weight += extremity;
    }

    if total_weight == 0.0 {
        return NEUTRAL_SCORE;
    }

    weighted_sum / total_weight
}
