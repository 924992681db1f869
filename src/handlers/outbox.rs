//! `/users/outbox/<suffix>` and `/outbox/<suffix>` — an actor's note feed.
//! The two routes share this handler; only their `RouteFlags::requires_auth`
//! differs, which is how an anonymous caller ends up on the public-only
//! `/outbox/` alias while an authenticated caller gets `/users/outbox/`'s
//! follower-aware view.

use std::sync::Arc;

use sqlx::{postgres::Postgres, QueryBuilder};

use crate::actor_display::{actor_display_name, text_and_links};
use crate::app_error::AppError;
use crate::gemini::{Request, Writer};
use crate::models::note::NOTE_COLUMNS;
use crate::models::{Actor, ActorType, Follow, Note};
use crate::server::{Conn, Handler};
use crate::visibility::{push_note_visibility, viewer_id};

use super::{is_self, parse_offset, suffix_to_canonical_id};

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    caps: Vec<String>,
) -> Result<(), AppError> {
    let suffix = caps.first().cloned().unwrap_or_default();
    let id = suffix_to_canonical_id(&suffix);
    let prefix = if req.path.starts_with("/users/") {
        "/users/outbox"
    } else {
        "/outbox"
    };

    let actor = Actor::find_by_id(&handler.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let offset = parse_offset(&req.raw_query);
    let page_size = handler.config.posts_per_page;
    let viewer = req.user.as_ref();

    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {NOTE_COLUMNS} FROM notes WHERE "));
    if actor.r#type == ActorType::Group {
        qb.push("notes.audience = ");
        qb.push_bind(actor.id.clone());
    } else {
        qb.push("notes.author = ");
        qb.push_bind(actor.id.clone());
    }
    qb.push(" AND ");
    push_note_visibility(&mut qb, viewer_id(viewer));
    qb.push(" ORDER BY inserted DESC LIMIT ");
    qb.push_bind(page_size + 1);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    let mut notes: Vec<Note> = qb
        .build_query_as()
        .fetch_all(&handler.db)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    let has_more = notes.len() as i64 > page_size;
    notes.truncate(page_size as usize);

    writer.ok().await?;
    writer.title(&actor_display_name(&actor)).await?;

    if let Some(summary) = actor.summary.as_deref().filter(|s| !s.is_empty()) {
        let (lines, links) = text_and_links(summary, 20, 60);
        for line in &lines {
            writer.text(line).await?;
        }
        for (url, label) in &links {
            writer.link(url, label).await?;
        }
        writer.empty().await?;
    }

    if notes.is_empty() {
        writer.text("No notes").await?;
    } else {
        for note in &notes {
            render_note(writer, note).await?;
        }
    }

    if has_more {
        writer
            .link(&format!("{prefix}/{suffix}?{}", offset + page_size), "Next")
            .await?;
    }

    writer.separator().await?;
    render_relationship_links(handler, writer, viewer, &actor, &suffix).await
}

async fn render_note(writer: &mut Writer<Conn>, note: &Note) -> Result<(), AppError> {
    let content = note
        .object
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let (lines, links) = text_and_links(content, 10, 60);

    writer.quote(&note.inserted.to_string()).await?;
    for line in &lines {
        writer.text(line).await?;
    }
    for (url, label) in &links {
        writer.link(url, label).await?;
    }
    writer.empty().await?;
    Ok(())
}

async fn render_relationship_links(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    viewer: Option<&Actor>,
    actor: &Actor,
    suffix: &str,
) -> Result<(), AppError> {
    let Some(viewer) = viewer else {
        return writer
            .link(&format!("/users/follow/{suffix}"), "Follow")
            .await
            .map_err(AppError::from);
    };

    if is_self(Some(viewer), actor) {
        return Ok(());
    }

    let outgoing = Follow::find(&handler.db, &viewer.id, &actor.id).await?;
    let incoming = Follow::find(&handler.db, &actor.id, &viewer.id).await?;

    match outgoing.as_ref().map(|f| f.accepted) {
        Some(Some(true)) => {
            writer
                .link(&format!("/users/unfollow/{suffix}"), "Unfollow")
                .await?;
            if matches!(incoming.as_ref().map(|f| f.accepted), Some(Some(true))) {
                writer
                    .link(&format!("/users/upload/dm/{suffix}"), "Message")
                    .await?;
            }
        }
        Some(None) => {
            writer.text("Follow request pending").await?;
        }
        _ => {
            writer
                .link(&format!("/users/follow/{suffix}"), "Follow")
                .await?;
        }
    }

    Ok(())
}
