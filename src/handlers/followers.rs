//! `/users/followers` — the viewer's own follower list, newest first, with
//! per-row Accept/Reject links and a `?lock`/`?unlock` toggle for
//! `manuallyApprovesFollowers`.

use std::sync::Arc;

use crate::actor_display::actor_display_name;
use crate::app_error::AppError;
use crate::gemini::{Request, Writer};
use crate::models::Actor;
use crate::server::{Conn, Handler};

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;

    match req.query_decoded().as_str() {
        "lock" => return toggle_lock(handler, writer, req, viewer, true).await,
        "unlock" => return toggle_lock(handler, writer, req, viewer, false).await,
        _ => {}
    }

    let rows = crate::models::Follow::list_followers_of(&handler.db, &viewer.id)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    writer.ok().await?;
    writer.title("Followers").await?;
    writer.empty().await?;

    if viewer.manually_approves_followers {
        writer.link("/users/followers?unlock", "Unlock (auto-accept new followers)").await?;
    } else {
        writer.link("/users/followers?lock", "Lock (require manual approval)").await?;
    }
    writer.empty().await?;

    if rows.is_empty() {
        writer.text("No followers").await?;
        return Ok(());
    }

    for follow in &rows {
        let follower = Actor::find_by_id(&handler.db, &follow.follower)
            .await
            .map_err(|e| AppError::storage(e.to_string()))?;
        let name = follower
            .as_ref()
            .map(actor_display_name)
            .unwrap_or_else(|| follow.follower.clone());
        let suffix = super::canonical_id_to_suffix(&follow.follower);

        writer
            .text(&format!("{} - {}", follow.inserted.date_naive(), name))
            .await?;

        if follow.is_pending() {
            writer
                .link(&format!("/users/follows/accept/{suffix}"), "Accept")
                .await?;
            writer
                .link(&format!("/users/follows/reject/{suffix}"), "Reject")
                .await?;
        } else {
            writer
                .link(&format!("/users/follows/reject/{suffix}"), "Reject")
                .await?;
        }
        writer.empty().await?;
    }

    Ok(())
}

async fn toggle_lock(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    _req: &Request,
    viewer: &Actor,
    lock: bool,
) -> Result<(), AppError> {
    let mut tx = handler
        .db
        .begin()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    Actor::set_manually_approves_followers(&mut tx, &viewer.id, lock)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    let mut updated = viewer.clone();
    updated.manually_approves_followers = lock;
    handler
        .outbox
        .update_actor(&mut tx, &updated)
        .await
        .map_err(|e| AppError::federation(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    writer.redirect("/users/followers").await.map_err(AppError::from)
}
