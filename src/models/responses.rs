use serde::{Deserialize, Serialize};

use crate::models::domain::{
    CompatibilityResult, EdgeStatus, MatchPartner, MatchStatistics,
};

/// Response for the candidate scoring endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreCandidatesResponse {
    pub results: Vec<CompatibilityResult>,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    /// True when the results came from cache after a storage failure
    #[serde(default)]
    pub degraded: bool,
}

/// Response for the like endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub created: bool,
    pub mutual: bool,
}

/// Response for accept / reject / pass endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(rename = "fromId")]
    pub from_id: String,
    #[serde(rename = "toId")]
    pub to_id: String,
    pub status: EdgeStatus,
    pub score: f64,
    #[serde(rename = "acceptedAt")]
    pub accepted_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "rejectedAt")]
    pub rejected_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Response for the accepted-matches listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchListResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub matches: Vec<MatchPartner>,
    pub count: usize,
}

/// Response for the statistics endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(flatten)]
    pub statistics: MatchStatistics,
    /// Engagement label for reporting, absent when the profile is unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether a trained match model is loaded (deterministic fallback otherwise)
    #[serde(rename = "modelLoaded")]
    pub model_loaded: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
