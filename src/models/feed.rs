use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool};

/// Materialised read model: one row per (follower, note) pair meaning "this
/// note is visible to this follower". `sharer` is set when the row exists
/// because a followed Group shared the note rather than authored it.
#[derive(Clone, Debug, FromRow, Serialize, Deserialize)]
pub struct FeedRow {
    pub follower: String,
    pub author: String,
    pub sharer: Option<String>,
    pub inserted: DateTime<Utc>,
    pub object: serde_json::Value,
}

impl FeedRow {
    /// The note id this row is about, read out of the preserved JSON body
    /// since `feed` itself is keyed on `(follower, author/sharer, inserted)`
    /// rather than carrying its own `note` column.
    pub fn note_id(&self) -> Option<&str> {
        self.object.get("id").and_then(|v| v.as_str())
    }

    /// 24-hour Firehose window for `/users/firehose`, newest first, paged.
    pub async fn list_recent_for_follower(
        pool: &PgPool,
        follower: &str,
        page_size: i64,
        offset: i64,
    ) -> Result<Vec<FeedRow>> {
        let rows = query_as::<_, FeedRow>(
            "SELECT follower, author, sharer, inserted, object FROM feed \
             WHERE follower = $1 AND inserted > now() - interval '24 hours' \
             ORDER BY inserted DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(follower)
        .bind(page_size + 1)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// One calendar day of `feed` rows for `/users/inbox/<date>`, the digest
    /// `/users` (Radio) links each day-count to, newest first, paged.
    pub async fn list_for_follower_on_date(
        pool: &PgPool,
        follower: &str,
        date: chrono::NaiveDate,
        page_size: i64,
        offset: i64,
    ) -> Result<Vec<FeedRow>> {
        let rows = query_as::<_, FeedRow>(
            "SELECT follower, author, sharer, inserted, object FROM feed \
             WHERE follower = $1 AND inserted::date = $2 \
             ORDER BY inserted DESC \
             LIMIT $3 OFFSET $4",
        )
        .bind(follower)
        .bind(date)
        .bind(page_size + 1)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_plus_one_signals_has_more() {
        // Handlers request page_size + 1 rows and truncate; this documents
        // that contract for callers of list_recent_for_follower.
        let requested = 10i64 + 1;
        assert_eq!(requested, 11);
    }
}
