use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// User profile with demographic, location and behavioral data
///
/// Profiles are owned by the profile-management service; this service reads
/// them and writes back only the derived fields (`activity_score`,
/// `profile_completeness`, `cluster`) and the match statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Interest tags, set semantics (deduplicated, unordered)
    #[serde(default)]
    pub interests: Vec<String>,
    /// Big Five trait scores in [0, 1], keyed by trait name
    #[serde(default)]
    pub personality: BTreeMap<String, f64>,
    #[serde(rename = "photoRef", default)]
    pub photo_ref: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(rename = "loginFrequency", default)]
    pub login_frequency: Option<u32>,
    #[serde(rename = "profileUpdates", default)]
    pub profile_updates: Option<u32>,
    #[serde(rename = "messageCount", default)]
    pub message_count: Option<u32>,
    #[serde(rename = "activityScore", default)]
    pub activity_score: Option<f64>,
    #[serde(rename = "profileCompleteness", default)]
    pub profile_completeness: Option<f64>,
    /// Topic cluster assigned by the metadata analyzer, -1 when unassigned
    #[serde(default = "unassigned_cluster")]
    pub cluster: i32,
}

fn unassigned_cluster() -> i32 {
    -1
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            age: None,
            latitude: None,
            longitude: None,
            bio: None,
            interests: Vec::new(),
            personality: BTreeMap::new(),
            photo_ref: None,
            gender: None,
            login_frequency: None,
            profile_updates: None,
            message_count: None,
            activity_score: None,
            profile_completeness: None,
            cluster: -1,
        }
    }

    /// Coordinate pair, present only when both components are set
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Lifecycle status of a directed relationship edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStatus {
    Pending,
    Accepted,
    Rejected,
}

impl EdgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeStatus::Pending => "pending",
            EdgeStatus::Accepted => "accepted",
            EdgeStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EdgeStatus::Pending),
            "accepted" => Some(EdgeStatus::Accepted),
            "rejected" => Some(EdgeStatus::Rejected),
            _ => None,
        }
    }

    /// Pending and accepted edges both count as live interest
    pub fn is_positive(&self) -> bool {
        matches!(self, EdgeStatus::Pending | EdgeStatus::Accepted)
    }
}

/// Directed interest relationship between two profiles
///
/// At most one edge exists per ordered (from, to) pair; edges are created by
/// a like or pass action and are never deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipEdge {
    #[serde(rename = "fromId")]
    pub from_id: String,
    #[serde(rename = "toId")]
    pub to_id: String,
    pub status: EdgeStatus,
    /// Compatibility score captured at creation time, in [0, 1]
    pub score: f64,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "acceptedAt", default)]
    pub accepted_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "rejectedAt", default)]
    pub rejected_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Per-profile secondary signals derived by the metadata analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileInsights {
    /// Topic cluster id, -1 when no cluster model is loaded
    pub cluster: i32,
    #[serde(rename = "activityScore")]
    pub activity_score: f64,
    #[serde(rename = "profileCompleteness")]
    pub profile_completeness: f64,
    pub engagement: Engagement,
}

impl Default for ProfileInsights {
    fn default() -> Self {
        Self {
            cluster: -1,
            activity_score: 0.0,
            profile_completeness: 0.0,
            engagement: Engagement::Low,
        }
    }
}

/// Engagement label derived from the activity score, used for reporting only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engagement {
    Low,
    Medium,
    High,
}

impl Engagement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engagement::Low => "low",
            Engagement::Medium => "medium",
            Engagement::High => "high",
        }
    }
}

/// Component breakdown of a compatibility score, rounded to 2 decimals
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComponentScores {
    #[serde(rename = "interestScore")]
    pub interest: f64,
    #[serde(rename = "locationScore")]
    pub location: f64,
    #[serde(rename = "ageScore")]
    pub age: f64,
    #[serde(rename = "personalityScore")]
    pub personality: f64,
}

/// Per-candidate compatibility outcome, produced per query and not persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResult {
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Overall score in [0, 1], rounded to 2 decimals
    #[serde(rename = "matchScore")]
    pub score: f64,
    #[serde(rename = "componentScores")]
    pub components: ComponentScores,
    #[serde(rename = "commonInterests")]
    pub common_interests: Vec<String>,
}

/// Match statistics recomputed from the relationship graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchStatistics {
    #[serde(rename = "likesSent")]
    pub likes_sent: u64,
    #[serde(rename = "dislikesSent")]
    pub dislikes_sent: u64,
    #[serde(rename = "mutualMatches")]
    pub mutual_matches: u64,
    #[serde(rename = "incomingLikes")]
    pub incoming_likes: u64,
    /// mutual matches / max(1, likes sent), rounded to 2 decimals
    #[serde(rename = "matchRate")]
    pub match_rate: f64,
    #[serde(rename = "updatedAt")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Set when recomputation failed and the counters are best-effort zeroes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MatchStatistics {
    /// Zeroed statistics carrying the failure that produced them
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            likes_sent: 0,
            dislikes_sent: 0,
            mutual_matches: 0,
            incoming_likes: 0,
            match_rate: 0.0,
            updated_at: chrono::Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// An accepted match partner with the score captured on the edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPartner {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "matchScore")]
    pub score: f64,
    #[serde(rename = "matchedAt")]
    pub matched_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Weights for the deterministic compatibility aggregator
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub interest: f64,
    pub location: f64,
    pub age: f64,
    pub personality: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            interest: 0.4,
            location: 0.2,
            age: 0.1,
            personality: 0.3,
        }
    }
}

/// Clamp band applied to the aggregated score after weighting
///
/// The band keeps user-facing scores away from 0% and 100%; it is a product
/// constant, kept configurable.
#[derive(Debug, Clone, Copy)]
pub struct ScoreBand {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for ScoreBand {
    fn default() -> Self {
        Self {
            floor: 0.40,
            ceiling: 0.95,
        }
    }
}

impl ScoreBand {
    pub fn clamp(&self, score: f64) -> f64 {
        score.max(self.floor).min(self.ceiling)
    }
}
