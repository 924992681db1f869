//! `/users/firehose` — the 24-hour union of notes from followed actors,
//! shares by followed actors, and replies to the viewer's own notes,
//! deduplicated by note id and paginated. `feed` already flattens the
//! first two legs into the Feed row; the reply leg is folded in here
//! since it has no row in that read model.

use std::sync::Arc;

use crate::actor_display::text_and_links;
use crate::app_error::AppError;
use crate::gemini::{Request, Writer};
use crate::models::{FeedRow, Note};
use crate::server::{Conn, Handler};

use super::parse_offset;

struct Item {
    id: String,
    inserted: i64,
    content: serde_json::Value,
}

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;
    let offset = parse_offset(&req.raw_query);
    let page_size = handler.config.posts_per_page;

    // Over-fetch each leg by the page window so a merge-then-paginate in
    // Rust still has enough rows to fill a page after deduplication.
    let fetch_window = offset + page_size + 1;

    let feed_rows = FeedRow::list_recent_for_follower(&handler.db, &viewer.id, fetch_window, 0)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    let since_epoch = (chrono::Utc::now() - chrono::Duration::hours(24)).timestamp();
    let replies = Note::list_recent_replies_to(&handler.db, &viewer.id, since_epoch)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    let mut items: Vec<Item> = Vec::with_capacity(feed_rows.len() + replies.len());
    for row in &feed_rows {
        if let Some(id) = row.note_id() {
            items.push(Item {
                id: id.to_string(),
                inserted: row.inserted.timestamp(),
                content: row.object.clone(),
            });
        }
    }
    for note in &replies {
        items.push(Item {
            id: note.id.clone(),
            inserted: note.inserted,
            content: note.object.clone(),
        });
    }

    items.sort_by_key(|i| std::cmp::Reverse(i.inserted));

    let mut seen = std::collections::HashSet::new();
    items.retain(|i| seen.insert(i.id.clone()));

    let has_more = items.len() as i64 > offset + page_size;
    let page: Vec<&Item> = items
        .iter()
        .skip(offset as usize)
        .take(page_size as usize)
        .collect();

    writer.ok().await?;
    writer.title("Firehose").await?;
    writer.empty().await?;

    if page.is_empty() {
        writer.text("Nothing in the last 24 hours").await?;
    } else {
        for item in &page {
            let content = item.content.get("content").and_then(|v| v.as_str()).unwrap_or("");
            let (lines, links) = text_and_links(content, 10, 60);
            writer.quote(&item.inserted.to_string()).await?;
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
        writer
            .link(&format!("/users/firehose?{}", offset + page_size), "Next")
            .await?;
    }

    Ok(())
}
