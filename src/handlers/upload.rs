//! `/users/upload/…` — the public/followers/DM/reply posting variants.
//! Each builds the `to`/`cc` audience appropriate to its variant and
//! writes the Note directly: only the Resolver and Outbox are named
//! collaborators, so note authorship is handled here rather than behind
//! a third interface.

use std::sync::Arc;

use crate::app_error::AppError;
use crate::gemini::{Request, Writer};
use crate::models::{Actor, Note, PUBLIC_ADDRESS};
use crate::server::{Conn, Handler};

use super::suffix_to_canonical_id;

async fn prompt_for_content(writer: &mut Writer<Conn>, req: &Request) -> Option<String> {
    let content = req.query_decoded();
    if content.is_empty() {
        let _ = writer.status(10, "Enter your post").await;
        None
    } else {
        Some(content)
    }
}

async fn publish(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    viewer: &Actor,
    in_reply_to: Option<&str>,
    audience: Option<&str>,
    to: Vec<String>,
    cc: Vec<String>,
    content: &str,
) -> Result<(), AppError> {
    Note::insert(&handler.db, &viewer.id, in_reply_to, audience, &to, &cc, content)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    writer
        .redirect(&format!("/users/outbox/{}", super::canonical_id_to_suffix(&viewer.id)))
        .await
        .map_err(AppError::from)
}

/// `/users/upload/public` — addressed to the Public collection, cc'd to
/// the viewer's own followers.
pub async fn public(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;
    let Some(content) = prompt_for_content(writer, req).await else {
        return Ok(());
    };
    let to = vec![PUBLIC_ADDRESS.to_string()];
    let cc = vec![viewer.followers.clone()];
    publish(handler, writer, viewer, None, None, to, cc, &content).await
}

/// `/users/upload/followers` — addressed only to the viewer's followers
/// collection.
pub async fn followers(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;
    let Some(content) = prompt_for_content(writer, req).await else {
        return Ok(());
    };
    let to = vec![viewer.followers.clone()];
    publish(handler, writer, viewer, None, None, to, Vec::new(), &content).await
}

/// `/users/upload/dm/<suffix>` — addressed only to a single target actor.
pub async fn dm(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;
    let Some(content) = prompt_for_content(writer, req).await else {
        return Ok(());
    };

    let suffix = caps.first().cloned().unwrap_or_default();
    let target_id = suffix_to_canonical_id(&suffix);
    let target = Actor::find_by_id(&handler.db, &target_id)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?
        .ok_or_else(|| AppError::not_found("User"))?;

    let to = vec![target.id.clone()];
    publish(handler, writer, viewer, None, None, to, Vec::new(), &content).await
}

/// `/users/upload/reply/<suffix>` — a reply to an existing note, inheriting
/// its visibility: public originals stay public, everything else narrows
/// to the original author.
pub async fn reply(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;
    let Some(content) = prompt_for_content(writer, req).await else {
        return Ok(());
    };

    let suffix = caps.first().cloned().unwrap_or_default();
    let note_id = suffix_to_canonical_id(&suffix);
    let original = Note::find_by_id(&handler.db, &note_id)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?
        .ok_or_else(|| AppError::not_found("Note"))?;

    let (to, cc) = if original.public {
        (
            vec![PUBLIC_ADDRESS.to_string()],
            vec![original.author.clone(), viewer.followers.clone()],
        )
    } else {
        (vec![original.author.clone()], Vec::new())
    };

    publish(
        handler,
        writer,
        viewer,
        Some(&original.id),
        original.audience.as_deref(),
        to,
        cc,
        &content,
    )
    .await
}
