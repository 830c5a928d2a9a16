use std::collections::BTreeMap;
use std::time::Duration;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::models::{
    EdgeStatus, MatchPartner, MatchStatistics, Profile, ProfileInsights, RelationshipEdge,
};
use crate::services::store::{ProfileStore, RelationshipStore, StoreError};

/// PostgreSQL client backing the profile and relationship stores
///
/// The relationship graph is multi-writer; every check-then-act the match
/// state machine needs is expressed as a single conditional statement
/// (ON CONFLICT upsert, guarded UPDATE) so the database provides the
/// atomicity, not application-level locking.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Connect and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");
        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
        )
        .await
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn profile_from_row(row: &PgRow) -> Result<Profile, StoreError> {
    // A malformed personality map degrades to empty instead of failing the
    // whole profile; scoring then uses the neutral personality default.
    let personality: BTreeMap<String, f64> = row
        .try_get::<Option<serde_json::Value>, _>("personality")?
        .and_then(|value| match serde_json::from_value(value) {
            Ok(map) => Some(map),
            Err(e) => {
                tracing::warn!("discarding malformed personality map: {}", e);
                None
            }
        })
        .unwrap_or_default();

    Ok(Profile {
        id: row.get("id"),
        age: row.get::<Option<i16>, _>("age").map(|a| a as u8),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        bio: row.get("bio"),
        interests: row
            .get::<Option<Vec<String>>, _>("interests")
            .unwrap_or_default(),
        personality,
        photo_ref: row.get("photo_ref"),
        gender: row.get("gender"),
        login_frequency: row
            .get::<Option<i32>, _>("login_frequency")
            .map(|n| n.max(0) as u32),
        profile_updates: row
            .get::<Option<i32>, _>("profile_updates")
            .map(|n| n.max(0) as u32),
        message_count: row
            .get::<Option<i32>, _>("message_count")
            .map(|n| n.max(0) as u32),
        activity_score: row.get("activity_score"),
        profile_completeness: row.get("profile_completeness"),
        cluster: row.get::<Option<i32>, _>("cluster").unwrap_or(-1),
    })
}

fn edge_from_row(row: &PgRow) -> Result<RelationshipEdge, StoreError> {
    let status: String = row.get("status");
    let status = EdgeStatus::parse(&status)
        .ok_or_else(|| StoreError::InvalidData(format!("edge status '{}'", status)))?;

    Ok(RelationshipEdge {
        from_id: row.get("from_id"),
        to_id: row.get("to_id"),
        status,
        score: row.get("score"),
        created_at: row.get("created_at"),
        accepted_at: row.get("accepted_at"),
        rejected_at: row.get("rejected_at"),
    })
}

impl ProfileStore for PostgresClient {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn list_candidates(
        &self,
        excluding: &str,
        limit: usize,
    ) -> Result<Vec<Profile>, StoreError> {
        let rows = sqlx::query("SELECT * FROM profiles WHERE id <> $1 ORDER BY id LIMIT $2")
            .bind(excluding)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(profile_from_row).collect()
    }

    async fn persist_insights(
        &self,
        id: &str,
        insights: &ProfileInsights,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET activity_score = $2,
                profile_completeness = $3,
                cluster = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(insights.activity_score)
        .bind(insights.profile_completeness)
        .bind(insights.cluster)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("profile {}", id)));
        }

        tracing::debug!(profile = id, cluster = insights.cluster, "persisted insights");
        Ok(())
    }

    async fn persist_statistics(
        &self,
        id: &str,
        statistics: &MatchStatistics,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET likes_sent = $2,
                dislikes_sent = $3,
                mutual_matches = $4,
                incoming_likes = $5,
                match_rate = $6,
                statistics_updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(statistics.likes_sent as i64)
        .bind(statistics.dislikes_sent as i64)
        .bind(statistics.mutual_matches as i64)
        .bind(statistics.incoming_likes as i64)
        .bind(statistics.match_rate)
        .bind(statistics.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("profile {}", id)));
        }
        Ok(())
    }
}

impl RelationshipStore for PostgresClient {
    async fn get_edge(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Option<RelationshipEdge>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM relationship_edges WHERE from_id = $1 AND to_id = $2",
        )
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(edge_from_row).transpose()
    }

    async fn upsert_edge(
        &self,
        from: &str,
        to: &str,
        status: EdgeStatus,
        score: f64,
    ) -> Result<(RelationshipEdge, bool), StoreError> {
        // ON CONFLICT DO NOTHING makes the create atomic; a concurrent
        // duplicate simply reports created = false.
        let result = sqlx::query(
            r#"
            INSERT INTO relationship_edges
                (from_id, to_id, status, score, created_at, rejected_at)
            VALUES
                ($1, $2, $3, $4, NOW(), CASE WHEN $3 = 'rejected' THEN NOW() END)
            ON CONFLICT (from_id, to_id) DO NOTHING
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(status.as_str())
        .bind(score)
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() > 0;

        let edge = self
            .get_edge(from, to)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("edge {} -> {}", from, to)))?;

        Ok((edge, created))
    }

    async fn set_status(
        &self,
        from: &str,
        to: &str,
        status: EdgeStatus,
    ) -> Result<RelationshipEdge, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE relationship_edges
            SET status = $3,
                accepted_at = CASE WHEN $3 = 'accepted' THEN NOW() ELSE accepted_at END,
                rejected_at = CASE WHEN $3 = 'rejected' THEN NOW() ELSE rejected_at END
            WHERE from_id = $1 AND to_id = $2
            RETURNING *
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => edge_from_row(&row),
            None => Err(StoreError::NotFound(format!("edge {} -> {}", from, to))),
        }
    }

    async fn accept_mutual(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        // One statement flips both directions or neither; the guards keep a
        // concurrent accept/reject from splitting the pair.
        let result = sqlx::query(
            r#"
            UPDATE relationship_edges
            SET status = 'accepted', accepted_at = NOW()
            WHERE ((from_id = $1 AND to_id = $2) OR (from_id = $2 AND to_id = $1))
              AND status = 'pending'
              AND EXISTS (
                  SELECT 1 FROM relationship_edges f
                  WHERE f.from_id = $1 AND f.to_id = $2 AND f.status = 'pending'
              )
              AND EXISTS (
                  SELECT 1 FROM relationship_edges r
                  WHERE r.from_id = $2 AND r.to_id = $1 AND r.status = 'pending'
              )
            "#,
        )
        .bind(a)
        .bind(b)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 2)
    }

    async fn edges_from(&self, user: &str) -> Result<Vec<RelationshipEdge>, StoreError> {
        let rows = sqlx::query("SELECT * FROM relationship_edges WHERE from_id = $1")
            .bind(user)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(edge_from_row).collect()
    }

    async fn edges_to(&self, user: &str) -> Result<Vec<RelationshipEdge>, StoreError> {
        let rows = sqlx::query("SELECT * FROM relationship_edges WHERE to_id = $1")
            .bind(user)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(edge_from_row).collect()
    }

    async fn accepted_partners(&self, user: &str) -> Result<Vec<MatchPartner>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT e.to_id, e.score, e.accepted_at
            FROM relationship_edges e
            WHERE e.from_id = $1
              AND e.status = 'accepted'
              AND EXISTS (
                  SELECT 1 FROM relationship_edges r
                  WHERE r.from_id = e.to_id AND r.to_id = e.from_id
                    AND r.status = 'accepted'
              )
            ORDER BY e.accepted_at DESC NULLS LAST
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| MatchPartner {
                user_id: row.get("to_id"),
                score: row.get("score"),
                matched_at: row.get("accepted_at"),
            })
            .collect())
    }
}
