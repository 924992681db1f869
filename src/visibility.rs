//! Reusable SQL fragments that decide note visibility.
//!
//! A note is visible to viewer V iff any of:
//!   1. `note.public = 1` and V may be anonymous.
//!   2. V is the author.
//!   3. V is an explicit recipient (`to0..to2`/`cc0..cc2`, or the JSON
//!      overflow arrays when `to2`/`cc2` is non-null).
//!   4. V follows an actor F (accepted) whose `followers` URL is the note's
//!      audience, or F is a Group with an accepted Share of the note.
//!
//! Binding the viewer id as NULL for an anonymous caller collapses branches
//! 2-4 to false by ordinary SQL NULL semantics, so one parameterised
//! fragment serves both anonymous and authenticated callers - it is
//! composed into every view that lists notes (outbox, fts, firehose)
//! instead of being copy-pasted.

use sqlx::{postgres::Postgres, QueryBuilder};

use crate::models::Actor;

pub fn viewer_id(viewer: Option<&Actor>) -> Option<&str> {
    viewer.map(|a| a.id.as_str())
}

/// Append `(<visibility disjunction>)` to `qb`, referencing a table aliased
/// `notes` in the surrounding query. Safe to AND into any WHERE clause that
/// selects from `notes` (optionally joined to `persons`/`follows`/`shares`).
pub fn push_note_visibility<'a>(qb: &mut QueryBuilder<'a, Postgres>, viewer: Option<&'a str>) {
    qb.push("(notes.public = true");

    qb.push(" OR (");
    qb.push_bind(viewer);
    qb.push("::text IS NOT NULL AND notes.author = ");
    qb.push_bind(viewer);
    qb.push(")");

    qb.push(" OR (");
    qb.push_bind(viewer);
    qb.push("::text IN (notes.to0, notes.to1, notes.to2, notes.cc0, notes.cc1, notes.cc2))");

    qb.push(" OR (notes.to2 IS NOT NULL AND notes.object->'to' ? ");
    qb.push_bind(viewer);
    qb.push("::text)");

    qb.push(" OR (notes.cc2 IS NOT NULL AND notes.object->'cc' ? ");
    qb.push_bind(viewer);
    qb.push("::text)");

    qb.push(
        " OR EXISTS (
            SELECT 1 FROM follows f
            JOIN persons p ON p.id = f.followed
            WHERE f.follower = ",
    );
    qb.push_bind(viewer);
    qb.push(
        " AND f.accepted = true
              AND (
                p.followers = notes.audience
                OR (p.type = 'Group' AND EXISTS (
                      SELECT 1 FROM shares s WHERE s.by = p.id AND s.note = notes.id
                    ))
              )
        )",
    );

    qb.push(")");
}

/// Ranking used by `/users/fts` to break ties between the visibility cases:
/// public match, follower match, direct-to-me match, lowest audience number
/// wins ties in rounded rank.
pub fn push_search_order(qb: &mut QueryBuilder<'_, Postgres>) {
    qb.push(" ORDER BY round(rank, 1) DESC, aud ASC, rank DESC");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_viewer_binds_null() {
        assert_eq!(viewer_id(None), None);
    }

    #[test]
    fn authenticated_viewer_binds_actor_id() {
        let actor = Actor {
            id: "https://srv/user/alice".to_string(),
            host: "srv".to_string(),
            r#type: crate::models::ActorType::Person,
            preferred_username: "alice".to_string(),
            name: None,
            summary: None,
            followers: "https://srv/user/alice/followers".to_string(),
            also_known_as: serde_json::json!([]),
            moved_to: None,
            manually_approves_followers: false,
            discoverable: true,
            published: chrono::Utc::now(),
            updated: chrono::Utc::now(),
            client_certificate: None,
            public_key: "pub".to_string(),
            private_key: None,
        };
        assert_eq!(viewer_id(Some(&actor)), Some("https://srv/user/alice"));
    }

    #[test]
    fn fragment_mentions_every_disjunct() {
        let mut qb = QueryBuilder::new("SELECT 1 FROM notes WHERE ");
        push_note_visibility(&mut qb, Some("https://srv/user/alice"));
        let sql = qb.sql();
        assert!(sql.contains("notes.public = true"));
        assert!(sql.contains("notes.author ="));
        assert!(sql.contains("to0, notes.to1, notes.to2"));
        assert!(sql.contains("object->'to'"));
        assert!(sql.contains("EXISTS"));
    }
}
