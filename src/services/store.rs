use thiserror::Error;

use crate::models::{
    EdgeStatus, MatchPartner, MatchStatistics, Profile, ProfileInsights, RelationshipEdge,
};

/// Errors surfaced by the storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Read access to profiles plus write-back of the derived fields
///
/// Profiles themselves are owned by the external profile-management service;
/// this service only persists insights and statistics onto them.
#[allow(async_fn_in_trait)]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError>;

    /// Candidate profiles excluding the requester, capped at `limit`
    async fn list_candidates(&self, excluding: &str, limit: usize)
        -> Result<Vec<Profile>, StoreError>;

    async fn persist_insights(&self, id: &str, insights: &ProfileInsights)
        -> Result<(), StoreError>;

    async fn persist_statistics(
        &self,
        id: &str,
        statistics: &MatchStatistics,
    ) -> Result<(), StoreError>;
}

/// The shared relationship graph
///
/// `upsert_edge` and `accept_mutual` are the two conditional-write
/// primitives the match state machine builds on; both must be atomic in the
/// backend so that racing likes cannot create duplicate edges or leave a
/// mutual pair half-accepted.
#[allow(async_fn_in_trait)]
pub trait RelationshipStore: Send + Sync {
    async fn get_edge(&self, from: &str, to: &str)
        -> Result<Option<RelationshipEdge>, StoreError>;

    /// Atomic create-or-no-op; returns the stored edge and whether this call
    /// created it
    async fn upsert_edge(
        &self,
        from: &str,
        to: &str,
        status: EdgeStatus,
        score: f64,
    ) -> Result<(RelationshipEdge, bool), StoreError>;

    /// Update an existing edge's status, stamping the matching timestamp;
    /// fails with [`StoreError::NotFound`] when the edge is absent
    async fn set_status(
        &self,
        from: &str,
        to: &str,
        status: EdgeStatus,
    ) -> Result<RelationshipEdge, StoreError>;

    /// Accept both directions of a pair in one atomic step, but only when
    /// both edges exist and are pending; returns whether the transition fired
    async fn accept_mutual(&self, a: &str, b: &str) -> Result<bool, StoreError>;

    async fn edges_from(&self, user: &str) -> Result<Vec<RelationshipEdge>, StoreError>;

    async fn edges_to(&self, user: &str) -> Result<Vec<RelationshipEdge>, StoreError>;

    /// Mutually accepted partners with the captured score, newest first
    async fn accepted_partners(&self, user: &str) -> Result<Vec<MatchPartner>, StoreError>;
}
