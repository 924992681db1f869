use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, PgPool, Postgres, Transaction};

/// `accepted`'s tri-state: `None` = pending, `Some(true)` = accepted,
/// `Some(false)` = rejected (terminal).
pub type FollowState = Option<bool>;

#[derive(Clone, Debug, FromRow, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    pub follower: String,
    pub followed: String,
    pub accepted: FollowState,
    pub inserted: DateTime<Utc>,
}

impl Follow {
    pub fn is_pending(&self) -> bool {
        self.accepted.is_none()
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted == Some(true)
    }

    pub fn is_rejected(&self) -> bool {
        self.accepted == Some(false)
    }

    pub async fn find(pool: &PgPool, follower: &str, followed: &str) -> Result<Option<Follow>> {
        let follow = query_as::<_, Follow>(
            "SELECT id, follower, followed, accepted, inserted FROM follows \
             WHERE follower = $1 AND followed = $2",
        )
        .bind(follower)
        .bind(followed)
        .fetch_optional(pool)
        .await?;
        Ok(follow)
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Follow>> {
        let follow = query_as::<_, Follow>(
            "SELECT id, follower, followed, accepted, inserted FROM follows WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(follow)
    }

    /// Rows where `followed` is the viewer, accepted or pending, newest
    /// first, for `/users/followers`.
    pub async fn list_followers_of(pool: &PgPool, followed: &str) -> Result<Vec<Follow>> {
        let rows = query_as::<_, Follow>(
            "SELECT id, follower, followed, accepted, inserted FROM follows \
             WHERE followed = $1 AND accepted IS DISTINCT FROM false \
             ORDER BY inserted DESC",
        )
        .bind(followed)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Pending rows in both directions for `/users/follows/pending`.
    pub async fn list_pending_both_directions(pool: &PgPool, actor: &str) -> Result<Vec<Follow>> {
        let rows = query_as::<_, Follow>(
            "SELECT id, follower, followed, accepted, inserted FROM follows \
             WHERE (follower = $1 OR followed = $1) AND accepted IS NULL \
             ORDER BY inserted DESC",
        )
        .bind(actor)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn set_accepted(
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
        accepted: bool,
    ) -> Result<()> {
        query("UPDATE follows SET accepted = $2 WHERE id = $1")
            .bind(id)
            .bind(accepted)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: &str) -> Result<()> {
        query("DELETE FROM follows WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
        follower: &str,
        followed: &str,
        accepted: FollowState,
    ) -> Result<Follow> {
        let row = query_as::<_, Follow>(
            "INSERT INTO follows (id, follower, followed, accepted, inserted) \
             VALUES ($1, $2, $3, $4, now()) \
             RETURNING id, follower, followed, accepted, inserted",
        )
        .bind(id)
        .bind(follower)
        .bind(followed)
        .bind(accepted)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(accepted: FollowState) -> Follow {
        Follow {
            id: "https://srv/activity/1".to_string(),
            follower: "https://srv/user/alice".to_string(),
            followed: "https://other/user/bob".to_string(),
            accepted,
            inserted: Utc::now(),
        }
    }

    #[test]
    fn pending_is_the_none_state() {
        let f = sample(None);
        assert!(f.is_pending());
        assert!(!f.is_accepted());
        assert!(!f.is_rejected());
    }

    #[test]
    fn accepted_and_rejected_are_distinct_some_states() {
        assert!(sample(Some(true)).is_accepted());
        assert!(sample(Some(false)).is_rejected());
        assert!(!sample(Some(false)).is_accepted());
    }
}
