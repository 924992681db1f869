use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool};
use uuid::Uuid;

pub const PUBLIC_ADDRESS: &str = "https://www.w3.org/ns/activitystreams#Public";

/// Every column a view handler selects when listing notes; shared so the
/// column list is written once instead of copy-pasted per query site.
pub const NOTE_COLUMNS: &str =
    "id, author, in_reply_to, audience, to0, to1, to2, cc0, cc1, cc2, public, inserted, object";

/// A post. The full ActivityPub JSON body is kept verbatim in `object` for
/// re-rendering and forwarding; `to0..to2`/`cc0..cc2` and `public` are
/// denormalised scalar columns so visibility predicates never have to parse
/// JSON on the hot path.
#[derive(Clone, Debug, FromRow, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub author: String,
    pub in_reply_to: Option<String>,
    pub audience: Option<String>,
    pub to0: Option<String>,
    pub to1: Option<String>,
    pub to2: Option<String>,
    pub cc0: Option<String>,
    pub cc1: Option<String>,
    pub cc2: Option<String>,
    pub public: bool,
    pub inserted: i64,
    pub object: serde_json::Value,
}

impl Note {
    /// `notes.public` is a derived boolean, recomputed whenever the scalar
    /// `to`/`cc` columns are (re)written: true iff the special Public
    /// address appears in either list.
    pub fn compute_public(to: &[String], cc: &[String]) -> bool {
        to.iter().chain(cc.iter()).any(|a| a == PUBLIC_ADDRESS)
    }

    /// The first three `to` recipients plus any overflow kept in the JSON
    /// body when there were more than three.
    pub fn to_recipients(&self) -> Vec<String> {
        Self::merge_overflow(&[&self.to0, &self.to1, &self.to2], &self.object, "to")
    }

    pub fn cc_recipients(&self) -> Vec<String> {
        Self::merge_overflow(&[&self.cc0, &self.cc1, &self.cc2], &self.object, "cc")
    }

    fn merge_overflow(
        scalars: &[&Option<String>; 3],
        object: &serde_json::Value,
        key: &str,
    ) -> Vec<String> {
        let has_overflow = scalars[2].is_some();
        if !has_overflow {
            return scalars.iter().filter_map(|s| s.clone()).collect();
        }
        object
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Note>> {
        let note = query_as::<_, Note>(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(note)
    }

    /// Replies to any note authored by `author` inserted after
    /// `since_epoch`, for the Firehose's "replies to my own notes" leg.
    pub async fn list_recent_replies_to(
        pool: &PgPool,
        author: &str,
        since_epoch: i64,
    ) -> Result<Vec<Note>> {
        let notes = query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes \
             WHERE inserted > $2 \
               AND in_reply_to IN (SELECT id FROM notes WHERE author = $1) \
             ORDER BY inserted DESC"
        ))
        .bind(author)
        .bind(since_epoch)
        .fetch_all(pool)
        .await?;
        Ok(notes)
    }

    /// `notes.inserted` of the most recent note authored by `author`, used
    /// by `/users/communities` to rank local Group actors by recency.
    pub async fn latest_authored_epoch(pool: &PgPool, author: &str) -> Result<Option<i64>> {
        let row: (Option<i64>,) =
            query_as("SELECT MAX(inserted) FROM notes WHERE author = $1")
                .bind(author)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }

    /// Writes a brand-new Note authored locally by `author`, denormalising
    /// the first three `to`/`cc` recipients into scalar columns and keeping
    /// the full lists in `object` so `to_recipients`/`cc_recipients` can
    /// recover any overflow past three. `content` is the plain text body
    /// the `/users/upload/*` handlers read off the wire.
    pub async fn insert(
        pool: &PgPool,
        author: &str,
        in_reply_to: Option<&str>,
        audience: Option<&str>,
        to: &[String],
        cc: &[String],
        content: &str,
    ) -> Result<Note> {
        let now = Utc::now();
        let id = format!("{author}/note/{}", Uuid::new_v4());
        let public = Self::compute_public(to, cc);

        let object = serde_json::json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": id,
            "type": "Note",
            "attributedTo": author,
            "inReplyTo": in_reply_to,
            "audience": audience,
            "to": to,
            "cc": cc,
            "content": content,
            "published": now.to_rfc3339(),
        });

        let note = query_as::<_, Note>(&format!(
            "INSERT INTO notes (
                id, author, in_reply_to, audience, to0, to1, to2, cc0, cc1, cc2,
                public, inserted, object
             ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13
             ) RETURNING {NOTE_COLUMNS}"
        ))
        .bind(&id)
        .bind(author)
        .bind(in_reply_to)
        .bind(audience)
        .bind(to.first())
        .bind(to.get(1))
        .bind(to.get(2))
        .bind(cc.first())
        .bind(cc.get(1))
        .bind(cc.get(2))
        .bind(public)
        .bind(now.timestamp())
        .bind(object)
        .fetch_one(pool)
        .await?;

        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compute_public_true_when_public_address_present() {
        let to = vec![PUBLIC_ADDRESS.to_string()];
        assert!(Note::compute_public(&to, &[]));
    }

    #[test]
    fn compute_public_false_for_direct_message() {
        let to = vec!["https://srv/user/alice".to_string()];
        assert!(!Note::compute_public(&to, &[]));
    }

    fn sample_note(to2: Option<&str>, object: serde_json::Value) -> Note {
        Note {
            id: "https://srv/note/1".to_string(),
            author: "https://srv/user/carol".to_string(),
            in_reply_to: None,
            audience: None,
            to0: Some("https://srv/user/alice".to_string()),
            to1: Some("https://srv/user/bob".to_string()),
            to2: to2.map(str::to_string),
            cc0: None,
            cc1: None,
            cc2: None,
            public: false,
            inserted: 0,
            object,
        }
    }

    #[test]
    fn to_recipients_uses_scalar_columns_when_no_overflow() {
        let note = sample_note(None, json!({}));
        assert_eq!(
            note.to_recipients(),
            vec![
                "https://srv/user/alice".to_string(),
                "https://srv/user/bob".to_string()
            ]
        );
    }

    #[test]
    fn to_recipients_reads_json_overflow_when_to2_present() {
        let note = sample_note(
            Some("https://srv/user/carol"),
            json!({"to": ["https://srv/user/alice", "https://srv/user/bob", "https://srv/user/carol", "https://srv/user/dave"]}),
        );
        assert_eq!(note.to_recipients().len(), 4);
    }
}
