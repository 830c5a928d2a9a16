use std::sync::Arc;

use crate::core::aggregator::round2;
use crate::models::{EdgeStatus, MatchStatistics};
use crate::services::store::{ProfileStore, RelationshipStore, StoreError};

/// Recomputes per-user counters from the relationship graph
///
/// The counters are written back onto the profile with a timestamp. Any
/// failure along the way yields a zeroed structure carrying the error
/// message; this component never propagates an error to its caller.
pub struct StatisticsAggregator<P, R> {
    profiles: Arc<P>,
    edges: Arc<R>,
}

impl<P: ProfileStore, R: RelationshipStore> StatisticsAggregator<P, R> {
    pub fn new(profiles: Arc<P>, edges: Arc<R>) -> Self {
        Self { profiles, edges }
    }

    pub async fn recompute(&self, user_id: &str) -> MatchStatistics {
        match self.try_recompute(user_id).await {
            Ok(statistics) => {
                tracing::info!(
                    user = user_id,
                    likes = statistics.likes_sent,
                    mutual = statistics.mutual_matches,
                    "recomputed match statistics"
                );
                statistics
            }
            Err(e) => {
                tracing::error!(user = user_id, "statistics recomputation failed: {}", e);
                MatchStatistics::degraded(e.to_string())
            }
        }
    }

    async fn try_recompute(&self, user_id: &str) -> Result<MatchStatistics, StoreError> {
        let outgoing = self.edges.edges_from(user_id).await?;
        let incoming = self.edges.edges_to(user_id).await?;

        let likes_sent = outgoing.iter().filter(|e| e.status.is_positive()).count() as u64;
        let dislikes_sent = outgoing
            .iter()
            .filter(|e| e.status == EdgeStatus::Rejected)
            .count() as u64;

        let mutual_matches = outgoing
            .iter()
            .filter(|e| e.status.is_positive())
            .filter(|e| {
                incoming
                    .iter()
                    .any(|r| r.from_id == e.to_id && r.status.is_positive())
            })
            .count() as u64;

        let incoming_likes = incoming
            .iter()
            .filter(|e| e.status == EdgeStatus::Pending)
            .filter(|e| !outgoing.iter().any(|o| o.to_id == e.from_id))
            .count() as u64;

        let match_rate = round2(mutual_matches as f64 / likes_sent.max(1) as f64);

        let statistics = MatchStatistics {
            likes_sent,
            dislikes_sent,
            mutual_matches,
            incoming_likes,
            match_rate,
            updated_at: chrono::Utc::now(),
            error: None,
        };

        self.profiles
            .persist_statistics(user_id, &statistics)
            .await?;

        Ok(statistics)
    }
}
