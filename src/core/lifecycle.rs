use std::sync::Arc;

use crate::core::engine::EngineError;
use crate::models::{EdgeStatus, RelationshipEdge};
use crate::services::store::{RelationshipStore, StoreError};

/// Outcome of a propose action
#[derive(Debug, Clone)]
pub struct ProposeOutcome {
    /// False when the edge already existed (informational, not an error)
    pub created: bool,
    /// True when this propose completed a mutual pair
    pub mutual: bool,
    pub edge: RelationshipEdge,
}

/// Lifecycle manager for the directed interest relationship
///
/// States per ordered pair: absent -> pending -> {accepted, rejected}.
/// All check-then-act sequences delegate to the store's conditional-write
/// primitives, so racing client actions cannot duplicate an edge or leave a
/// mutual pair half-accepted.
pub struct MatchStateMachine<R> {
    edges: Arc<R>,
}

impl<R: RelationshipStore> MatchStateMachine<R> {
    pub fn new(edges: Arc<R>) -> Self {
        Self { edges }
    }

    pub(crate) fn store(&self) -> &Arc<R> {
        &self.edges
    }

    /// Record directed interest and detect a mutual match
    ///
    /// A duplicate propose reports `created = false` without touching state.
    /// When the reverse edge is pending, both directions transition to
    /// accepted in a single atomic storage step.
    pub async fn propose(
        &self,
        from: &str,
        to: &str,
        score: f64,
    ) -> Result<ProposeOutcome, EngineError> {
        if from == to {
            return Err(EngineError::InvalidInput(
                "cannot propose a match with yourself".to_string(),
            ));
        }

        let (edge, created) = self
            .edges
            .upsert_edge(from, to, EdgeStatus::Pending, score)
            .await?;

        if !created {
            tracing::debug!(from, to, "edge already exists, propose is a no-op");
            return Ok(ProposeOutcome {
                created: false,
                mutual: edge.status == EdgeStatus::Accepted,
                edge,
            });
        }

        let mutual = self.edges.accept_mutual(from, to).await?;
        let edge = if mutual {
            tracing::info!(from, to, "mutual match detected");
            self.edges.get_edge(from, to).await?.unwrap_or(edge)
        } else {
            edge
        };

        Ok(ProposeOutcome {
            created: true,
            mutual,
            edge,
        })
    }

    /// Record an explicit negative interaction
    ///
    /// Creates the edge directly in rejected state; a duplicate pass is a
    /// no-op against whatever state the edge already holds.
    pub async fn pass(
        &self,
        from: &str,
        to: &str,
    ) -> Result<(RelationshipEdge, bool), EngineError> {
        if from == to {
            return Err(EngineError::InvalidInput(
                "cannot pass on yourself".to_string(),
            ));
        }

        let (edge, created) = self
            .edges
            .upsert_edge(from, to, EdgeStatus::Rejected, 0.0)
            .await?;
        Ok((edge, created))
    }

    /// Accept an existing edge; fails when the edge is absent
    pub async fn accept(&self, from: &str, to: &str) -> Result<RelationshipEdge, EngineError> {
        self.transition(from, to, EdgeStatus::Accepted).await
    }

    /// Reject an existing edge; fails when the edge is absent
    ///
    /// Rejecting an accepted edge is allowed and un-matches the pair in this
    /// direction.
    pub async fn reject(&self, from: &str, to: &str) -> Result<RelationshipEdge, EngineError> {
        self.transition(from, to, EdgeStatus::Rejected).await
    }

    async fn transition(
        &self,
        from: &str,
        to: &str,
        status: EdgeStatus,
    ) -> Result<RelationshipEdge, EngineError> {
        match self.edges.set_status(from, to, status).await {
            Ok(edge) => {
                tracing::info!(from, to, status = status.as_str(), "edge transitioned");
                Ok(edge)
            }
            Err(StoreError::NotFound(what)) => Err(EngineError::NotFound(what)),
            Err(e) => Err(e.into()),
        }
    }
}
