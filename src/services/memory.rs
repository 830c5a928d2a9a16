use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::models::{
    EdgeStatus, MatchPartner, MatchStatistics, Profile, ProfileInsights, RelationshipEdge,
};
use crate::services::store::{ProfileStore, RelationshipStore, StoreError};

/// In-memory store backing tests and local development
///
/// Mirrors the Postgres conditional-write semantics: every compound
/// check-then-act runs under one mutex guard, so it is atomic with respect
/// to concurrent callers.
#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<HashMap<String, Profile>>,
    edges: Mutex<BTreeMap<(String, String), RelationshipEdge>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.profiles
            .lock()
            .expect("profile lock poisoned")
            .insert(profile.id.clone(), profile);
    }

    fn edge_key(from: &str, to: &str) -> (String, String) {
        (from.to_string(), to.to_string())
    }
}

impl ProfileStore for MemoryStore {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let profiles = self.profiles.lock().expect("profile lock poisoned");
        Ok(profiles.get(id).cloned())
    }

    async fn list_candidates(
        &self,
        excluding: &str,
        limit: usize,
    ) -> Result<Vec<Profile>, StoreError> {
        let profiles = self.profiles.lock().expect("profile lock poisoned");
        let mut candidates: Vec<Profile> = profiles
            .values()
            .filter(|p| p.id != excluding)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn persist_insights(
        &self,
        id: &str,
        insights: &ProfileInsights,
    ) -> Result<(), StoreError> {
        let mut profiles = self.profiles.lock().expect("profile lock poisoned");
        let profile = profiles
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))?;
        profile.activity_score = Some(insights.activity_score);
        profile.profile_completeness = Some(insights.profile_completeness);
        profile.cluster = insights.cluster;
        Ok(())
    }

    async fn persist_statistics(
        &self,
        id: &str,
        _statistics: &MatchStatistics,
    ) -> Result<(), StoreError> {
        let profiles = self.profiles.lock().expect("profile lock poisoned");
        if !profiles.contains_key(id) {
            return Err(StoreError::NotFound(format!("profile {}", id)));
        }
        Ok(())
    }
}

impl RelationshipStore for MemoryStore {
    async fn get_edge(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Option<RelationshipEdge>, StoreError> {
        let edges = self.edges.lock().expect("edge lock poisoned");
        Ok(edges.get(&Self::edge_key(from, to)).cloned())
    }

    async fn upsert_edge(
        &self,
        from: &str,
        to: &str,
        status: EdgeStatus,
        score: f64,
    ) -> Result<(RelationshipEdge, bool), StoreError> {
        let mut edges = self.edges.lock().expect("edge lock poisoned");
        let key = Self::edge_key(from, to);

        if let Some(existing) = edges.get(&key) {
            return Ok((existing.clone(), false));
        }

        let now = chrono::Utc::now();
        let edge = RelationshipEdge {
            from_id: from.to_string(),
            to_id: to.to_string(),
            status,
            score,
            created_at: now,
            accepted_at: (status == EdgeStatus::Accepted).then_some(now),
            rejected_at: (status == EdgeStatus::Rejected).then_some(now),
        };
        edges.insert(key, edge.clone());
        Ok((edge, true))
    }

    async fn set_status(
        &self,
        from: &str,
        to: &str,
        status: EdgeStatus,
    ) -> Result<RelationshipEdge, StoreError> {
        let mut edges = self.edges.lock().expect("edge lock poisoned");
        let edge = edges
            .get_mut(&Self::edge_key(from, to))
            .ok_or_else(|| StoreError::NotFound(format!("edge {} -> {}", from, to)))?;

        let now = chrono::Utc::now();
        edge.status = status;
        match status {
            EdgeStatus::Accepted => edge.accepted_at = Some(now),
            EdgeStatus::Rejected => edge.rejected_at = Some(now),
            EdgeStatus::Pending => {}
        }
        Ok(edge.clone())
    }

    async fn accept_mutual(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        let mut edges = self.edges.lock().expect("edge lock poisoned");

        let forward_pending = edges
            .get(&Self::edge_key(a, b))
            .is_some_and(|e| e.status == EdgeStatus::Pending);
        let reverse_pending = edges
            .get(&Self::edge_key(b, a))
            .is_some_and(|e| e.status == EdgeStatus::Pending);

        if !(forward_pending && reverse_pending) {
            return Ok(false);
        }

        let now = chrono::Utc::now();
        for key in [Self::edge_key(a, b), Self::edge_key(b, a)] {
            if let Some(edge) = edges.get_mut(&key) {
                edge.status = EdgeStatus::Accepted;
                edge.accepted_at = Some(now);
            }
        }
        Ok(true)
    }

    async fn edges_from(&self, user: &str) -> Result<Vec<RelationshipEdge>, StoreError> {
        let edges = self.edges.lock().expect("edge lock poisoned");
        Ok(edges
            .values()
            .filter(|e| e.from_id == user)
            .cloned()
            .collect())
    }

    async fn edges_to(&self, user: &str) -> Result<Vec<RelationshipEdge>, StoreError> {
        let edges = self.edges.lock().expect("edge lock poisoned");
        Ok(edges
            .values()
            .filter(|e| e.to_id == user)
            .cloned()
            .collect())
    }

    async fn accepted_partners(&self, user: &str) -> Result<Vec<MatchPartner>, StoreError> {
        let edges = self.edges.lock().expect("edge lock poisoned");
        let mut partners: Vec<MatchPartner> = edges
            .values()
            .filter(|e| e.from_id == user && e.status == EdgeStatus::Accepted)
            .filter(|e| {
                edges
                    .get(&Self::edge_key(&e.to_id, &e.from_id))
                    .is_some_and(|r| r.status == EdgeStatus::Accepted)
            })
            .map(|e| MatchPartner {
                user_id: e.to_id.clone(),
                score: e.score,
                matched_at: e.accepted_at,
            })
            .collect();
        partners.sort_by(|a, b| b.matched_at.cmp(&a.matched_at));
        Ok(partners)
    }
}
