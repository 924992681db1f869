//! `/users/fts?<query>` — full-text search over `notesfts`, the mirror
//! table. Query may end with ` skip <n>` to paginate. Ranking: public
//! match, follower match, direct-to-me match, with `round(rank, 1) DESC,
//! min(aud) ASC, rank DESC` breaking ties.

use std::sync::Arc;

use sqlx::{postgres::Postgres, FromRow, QueryBuilder};

use crate::actor_display::text_and_links;
use crate::app_error::AppError;
use crate::gemini::{Request, Writer};
use crate::server::{Conn, Handler};
use crate::visibility::{push_note_visibility, viewer_id};

#[derive(FromRow)]
struct SearchHit {
    inserted: i64,
    object: serde_json::Value,
}

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let raw = req.query_decoded();
    let (query_text, offset) = split_skip(&raw);

    if query_text.trim().is_empty() {
        writer.status(10, "Enter a search query").await?;
        return Ok(());
    }

    let page_size = handler.config.posts_per_page;
    let viewer = req.user.as_ref();

    let mut qb = QueryBuilder::<Postgres>::new(
        "WITH matched AS ( \
            SELECT DISTINCT ON (notes.id) notes.id, notes.inserted, notes.object, \
                ts_rank(notesfts.document, plainto_tsquery('english', ",
    );
    qb.push_bind(query_text.clone());
    qb.push(
        ")) AS rank, \
                CASE \
                    WHEN notes.public OR notes.author = ",
    );
    qb.push_bind(viewer_id(viewer));
    qb.push(
        " THEN 0 \
                    WHEN EXISTS ( \
                        SELECT 1 FROM follows f JOIN persons p ON p.id = f.followed \
                        WHERE f.follower = ",
    );
    qb.push_bind(viewer_id(viewer));
    qb.push(
        " AND f.accepted = true \
                          AND (p.followers = notes.audience \
                               OR (p.type = 'Group' AND EXISTS ( \
                                     SELECT 1 FROM shares s WHERE s.by = p.id AND s.note = notes.id))) \
                    ) THEN 1 \
                    ELSE 2 \
                END AS aud \
            FROM notes \
            JOIN notesfts ON notesfts.note_id = notes.id \
            WHERE notesfts.document @@ plainto_tsquery('english', ",
    );
    qb.push_bind(query_text.clone());
    qb.push(") AND ");
    push_note_visibility(&mut qb, viewer_id(viewer));
    qb.push(" ORDER BY notes.id, rank DESC ) SELECT inserted, object FROM matched ");
    crate::visibility::push_search_order(&mut qb);
    qb.push(" LIMIT ");
    qb.push_bind(page_size + 1);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    let mut hits: Vec<SearchHit> = qb
        .build_query_as()
        .fetch_all(&handler.db)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    let has_more = hits.len() as i64 > page_size;
    hits.truncate(page_size as usize);

    writer.ok().await?;
    writer.titlef(format_args!("Search: {query_text}")).await?;
    writer.empty().await?;

    if hits.is_empty() {
        writer.text("No matches").await?;
    } else {
        for hit in &hits {
            let content = hit.object.get("content").and_then(|v| v.as_str()).unwrap_or("");
            let (lines, links) = text_and_links(content, 10, 60);
            writer.quote(&hit.inserted.to_string()).await?;
            for line in &lines {
                writer.text(line).await?;
            }
            for (url, label) in &links {
                writer.link(url, label).await?;
            }
            writer.empty().await?;
        }
    }

    if has_more {
        let next = urlencoding::encode(&format!("{query_text} skip {}", offset + page_size));
        writer.link(&format!("/users/fts?{next}"), "Next").await?;
    }

    Ok(())
}

/// Splits `"<query> skip <n>"` into `(query, offset)`, defaulting to 0 when
/// the trailing `skip` clause is absent or malformed.
fn split_skip(raw: &str) -> (String, i64) {
    if let Some(idx) = raw.rfind(" skip ") {
        let (query, rest) = raw.split_at(idx);
        let n = rest[" skip ".len()..].trim().parse::<i64>().unwrap_or(0).max(0);
        (query.to_string(), n)
    } else {
        (raw.to_string(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_skip_parses_the_trailing_clause() {
        assert_eq!(split_skip("hello skip 10"), ("hello".to_string(), 10));
    }

    #[test]
    fn split_skip_defaults_to_zero_without_a_clause() {
        assert_eq!(split_skip("hello"), ("hello".to_string(), 0));
    }

    #[test]
    fn split_skip_ignores_a_malformed_count() {
        assert_eq!(split_skip("hello skip abc"), ("hello".to_string(), 0));
    }
}
