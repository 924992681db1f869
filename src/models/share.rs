use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool};

/// A Group actor's announce of a Note.
#[derive(Clone, Debug, FromRow, Serialize, Deserialize)]
pub struct Share {
    pub by: String,
    pub note: String,
    pub inserted: DateTime<Utc>,
}

impl Share {
    /// Most recent share timestamp by a given actor, used to rank
    /// `/users/communities` by recency alongside authored notes.
    pub async fn latest_by(pool: &PgPool, by: &str) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> =
            query_as("SELECT MAX(inserted) FROM shares WHERE by = $1 HAVING MAX(inserted) IS NOT NULL")
                .bind(by)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(ts,)| ts))
    }

    /// Same as [`Share::latest_by`] but as a unix-second epoch, so it can be
    /// compared directly against `notes.inserted` without a type conversion
    /// at every call site.
    pub async fn latest_by_epoch(pool: &PgPool, by: &str) -> Result<Option<i64>> {
        Ok(Self::latest_by(pool, by).await?.map(|ts| ts.timestamp()))
    }
}
