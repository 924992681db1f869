//! `/users/follows/pending` plus `/users/follows/accept/<…>` and
//! `/users/follows/reject/<…>` — pending follow activity in both
//! directions, and the Accept/Reject mutations that resolve it.
//! Acceptance transitions are `Outbox.Accept`/`Outbox.Reject`;
//! `follows/pending` is the "accepted" state machine's pending leg.

use std::sync::Arc;

use crate::actor_display::actor_display_name;
use crate::app_error::AppError;
use crate::gemini::{Request, Writer};
use crate::models::{Actor, Follow};
use crate::server::{Conn, Handler};

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;

    let rows = Follow::list_pending_both_directions(&handler.db, &viewer.id)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    writer.ok().await?;
    writer.title("Pending follows").await?;
    writer.empty().await?;

    if rows.is_empty() {
        writer.text("No pending follows").await?;
        return Ok(());
    }

    for follow in &rows {
        let other_id = if follow.followed == viewer.id {
            &follow.follower
        } else {
            &follow.followed
        };
        let other = Actor::find_by_id(&handler.db, other_id)
            .await
            .map_err(|e| AppError::storage(e.to_string()))?;
        let name = other
            .as_ref()
            .map(actor_display_name)
            .unwrap_or_else(|| other_id.clone());

        let direction = if follow.followed == viewer.id {
            "wants to follow you"
        } else {
            "awaiting their approval"
        };
        writer
            .text(&format!("{} - {name} ({direction})", follow.inserted.date_naive()))
            .await?;

        if follow.followed == viewer.id {
            let suffix = super::canonical_id_to_suffix(other_id);
            writer
                .link(&format!("/users/follows/accept/{suffix}"), "Accept")
                .await?;
            writer
                .link(&format!("/users/follows/reject/{suffix}"), "Reject")
                .await?;
        }
        writer.empty().await?;
    }

    Ok(())
}

pub async fn accept(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    caps: Vec<String>,
) -> Result<(), AppError> {
    resolve_transition(handler, writer, req, caps, true).await
}

pub async fn reject(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    caps: Vec<String>,
) -> Result<(), AppError> {
    resolve_transition(handler, writer, req, caps, false).await
}

async fn resolve_transition(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    caps: Vec<String>,
    accept: bool,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;
    let suffix = caps.first().cloned().unwrap_or_default();
    let follower_id = super::suffix_to_canonical_id(&suffix);

    let follow = Follow::find(&handler.db, &follower_id, &viewer.id)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?
        .ok_or_else(|| AppError::not_found("Follow request"))?;

    let mut tx = handler
        .db
        .begin()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    if accept {
        handler
            .outbox
            .accept(&mut tx, &follow)
            .await
            .map_err(|e| AppError::federation(e.to_string()))?;
    } else {
        handler
            .outbox
            .reject(&mut tx, &follow)
            .await
            .map_err(|e| AppError::federation(e.to_string()))?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    writer
        .redirect("/users/follows/pending")
        .await
        .map_err(AppError::from)
}
