// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CompatibilityResult, ComponentScores, EdgeStatus, Engagement, MatchPartner, MatchStatistics,
    Profile, ProfileInsights, RelationshipEdge, ScoreBand, ScoringWeights,
};
pub use requests::{InteractionRequest, ScoreCandidatesRequest};
pub use responses::{
    ErrorResponse, HealthResponse, InteractionResponse, LikeResponse, MatchListResponse,
    ScoreCandidatesResponse, StatisticsResponse,
};
