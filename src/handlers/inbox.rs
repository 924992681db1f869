//! `/users/inbox/<YYYY-MM-DD>` — the per-day digest `/users` (Radio) links
//! to: every `feed` row for the viewer on that calendar date, newest first,
//! paginated the same way as outbox/fts/firehose.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::actor_display::text_and_links;
use crate::app_error::AppError;
use crate::gemini::{Request, Writer};
use crate::models::FeedRow;
use crate::server::{Conn, Handler};

use super::parse_offset;

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;

    let raw_date = caps.first().cloned().unwrap_or_default();
    let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
        .map_err(|_| AppError::bad_input("Malformed date"))?;

    let offset = parse_offset(&req.raw_query);
    let page_size = handler.config.posts_per_page;

    let mut rows = FeedRow::list_for_follower_on_date(&handler.db, &viewer.id, date, page_size, offset)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    let has_more = rows.len() as i64 > page_size;
    rows.truncate(page_size as usize);

    writer.ok().await?;
    writer.titlef(format_args!("Inbox: {date}")).await?;
    writer.empty().await?;

    if rows.is_empty() {
        writer.text("Nothing on this day").await?;
    } else {
        for row in &rows {
            let content = row.object.get("content").and_then(|v| v.as_str()).unwrap_or("");
            let (lines, links) = text_and_links(content, 10, 60);
            writer.quote(&row.inserted.timestamp().to_string()).await?;
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
            .link(
                &format!("/users/inbox/{date}?{}", offset + page_size),
                "Next",
            )
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_date_is_rejected() {
        assert!(NaiveDate::parse_from_str("not-a-date", "%Y-%m-%d").is_err());
    }

    #[test]
    fn well_formed_date_round_trips_through_display() {
        let date = NaiveDate::parse_from_str("2026-07-28", "%Y-%m-%d").unwrap();
        assert_eq!(date.to_string(), "2026-07-28");
    }
}
