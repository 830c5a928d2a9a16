use std::sync::Arc;

use crate::core::cluster::ClusterModel;
use crate::models::{Engagement, Profile, ProfileInsights};

/// Saturation constants for the activity factors
const LOGIN_SATURATION: f64 = 30.0;
const UPDATE_SATURATION: f64 = 10.0;
const MESSAGE_SATURATION: f64 = 100.0;

/// Engagement thresholds over the activity score
const HIGH_ENGAGEMENT: f64 = 0.7;
const MEDIUM_ENGAGEMENT: f64 = 0.3;

/// Derives secondary, behavior- and text-based signals for a profile
///
/// Completeness and activity are pure computations. Cluster assignment needs
/// the fitted grouping model; without it every profile stays unassigned.
/// Analysis never fails: malformed inputs fall back to documented defaults.
#[derive(Clone, Default)]
pub struct MetadataAnalyzer {
    cluster_model: Option<Arc<ClusterModel>>,
}

impl MetadataAnalyzer {
    pub fn new(cluster_model: Option<Arc<ClusterModel>>) -> Self {
        if cluster_model.is_none() {
            tracing::warn!("no cluster model loaded, profiles will stay unassigned");
        }
        Self { cluster_model }
    }

    pub fn has_cluster_model(&self) -> bool {
        self.cluster_model.is_some()
    }

    /// Compute all secondary signals for a profile
    pub fn analyze(&self, profile: &Profile) -> ProfileInsights {
        let activity_score = activity_score(profile);

        ProfileInsights {
            cluster: self.assign_cluster(profile),
            activity_score,
            profile_completeness: profile_completeness(profile),
            engagement: engagement_label(activity_score),
        }
    }

    fn assign_cluster(&self, profile: &Profile) -> i32 {
        let Some(model) = &self.cluster_model else {
            return -1;
        };

        let text = profile_text(profile);
        if text.is_empty() {
            tracing::debug!(profile = %profile.id, "no text features, leaving cluster unassigned");
            return -1;
        }

        let cluster = model.assign(&text);
        if cluster < 0 || cluster as usize >= model.cluster_count() {
            tracing::warn!(profile = %profile.id, cluster, "cluster out of range, treating as unassigned");
            return -1;
        }
        cluster
    }
}

/// Textual features used for cluster assignment: bio, interests, coordinates
pub fn profile_text(profile: &Profile) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(bio) = &profile.bio {
        if !bio.trim().is_empty() {
            parts.push(bio.trim().to_string());
        }
    }
    parts.extend(profile.interests.iter().cloned());
    if let Some((lat, lon)) = profile.coordinates() {
        parts.push(format!("{:.2} {:.2}", lat, lon));
    }

    parts.join(" ")
}

/// Fraction of the required-field checklist that is filled in
pub fn profile_completeness(profile: &Profile) -> f64 {
    let checklist = [
        profile.bio.as_deref().is_some_and(|b| !b.trim().is_empty()),
        !profile.interests.is_empty(),
        profile.coordinates().is_some(),
        profile
            .photo_ref
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty()),
        profile
            .gender
            .as_deref()
            .is_some_and(|g| !g.trim().is_empty()),
        profile.age.is_some(),
    ];

    let completed = checklist.iter().filter(|&&done| done).count();
    completed as f64 / checklist.len() as f64
}

/// Normalized activity from login, update and message counters
///
/// Each present factor saturates at its constant and is clamped to 1.0; the
/// score is the mean over present factors, 0.0 when none are present.
pub fn activity_score(profile: &Profile) -> f64 {
    let factors = [
        profile
            .login_frequency
            .map(|n| (f64::from(n) / LOGIN_SATURATION).min(1.0)),
        profile
            .profile_updates
            .map(|n| (f64::from(n) / UPDATE_SATURATION).min(1.0)),
        profile
            .message_count
            .map(|n| (f64::from(n) / MESSAGE_SATURATION).min(1.0)),
    ];

    let present: Vec<f64> = factors.into_iter().flatten().collect();
    if present.is_empty() {
        return 0.0;
    }
    present.iter().sum::<f64>() / present.len() as f64
}

pub fn engagement_label(activity_score: f64) -> Engagement {
    if activity_score >= HIGH_ENGAGEMENT {
        Engagement::High
    } else if activity_score >= MEDIUM_ENGAGEMENT {
        Engagement::Medium
    } else {
        Engagement::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cluster::ClusterModel;

    fn full_profile() -> Profile {
        let mut p = Profile::new("full");
        p.age = Some(29);
        p.latitude = Some(52.52);
        p.longitude = Some(13.40);
        p.bio = Some("hiking and cooking on weekends".to_string());
        p.interests = vec!["hiking".to_string(), "cooking".to_string()];
        p.photo_ref = Some("photos/full.jpg".to_string());
        p.gender = Some("female".to_string());
        p
    }

    #[test]
    fn test_completeness_full_profile() {
        assert_eq!(profile_completeness(&full_profile()), 1.0);
    }

    #[test]
    fn test_completeness_empty_profile() {
        assert_eq!(profile_completeness(&Profile::new("empty")), 0.0);
    }

    #[test]
    fn test_completeness_blank_strings_do_not_count() {
        let mut p = full_profile();
        p.bio = Some("   ".to_string());
        p.photo_ref = Some(String::new());
        assert!((profile_completeness(&p) - 4.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_activity_score_saturates() {
        let mut p = Profile::new("busy");
        p.login_frequency = Some(300);
        p.profile_updates = Some(50);
        p.message_count = Some(1000);
        assert_eq!(activity_score(&p), 1.0);
    }

    #[test]
    fn test_activity_score_averages_present_factors() {
        let mut p = Profile::new("partial");
        p.login_frequency = Some(15); // 0.5
        p.message_count = Some(25); // 0.25
        assert!((activity_score(&p) - 0.375).abs() < 1e-9);
    }

    #[test]
    fn test_activity_score_no_counters() {
        assert_eq!(activity_score(&Profile::new("quiet")), 0.0);
    }

    #[test]
    fn test_engagement_thresholds() {
        assert_eq!(engagement_label(0.0), Engagement::Low);
        assert_eq!(engagement_label(0.3), Engagement::Medium);
        assert_eq!(engagement_label(0.69), Engagement::Medium);
        assert_eq!(engagement_label(0.7), Engagement::High);
    }

    #[test]
    fn test_analyze_without_model_leaves_cluster_unassigned() {
        let analyzer = MetadataAnalyzer::default();
        let insights = analyzer.analyze(&full_profile());

        assert_eq!(insights.cluster, -1);
        assert!(insights.profile_completeness > 0.9);
    }

    #[test]
    fn test_analyze_with_model_assigns_cluster() {
        let corpus = vec![
            "hiking camping outdoors trails".to_string(),
            "outdoors hiking forest camping".to_string(),
            "cooking baking food recipes".to_string(),
            "recipes kitchen cooking food".to_string(),
            "guitar concerts music piano".to_string(),
        ];
        let model = ClusterModel::fit(&corpus).unwrap();
        let analyzer = MetadataAnalyzer::new(Some(Arc::new(model)));

        let insights = analyzer.analyze(&full_profile());
        assert!(insights.cluster >= 0);
    }

    #[test]
    fn test_analyze_empty_profile_is_all_defaults() {
        let analyzer = MetadataAnalyzer::default();
        let insights = analyzer.analyze(&Profile::new("empty"));

        assert_eq!(insights.cluster, -1);
        assert_eq!(insights.activity_score, 0.0);
        assert_eq!(insights.profile_completeness, 0.0);
        assert_eq!(insights.engagement, Engagement::Low);
    }
}
