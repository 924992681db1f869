//! `/users/move?<name@domain>` — the Move state machine's one-shot
//! `active → moved` transition. Allowed exactly once per actor and only
//! once both sides' `alsoKnownAs` name each other.

use std::sync::Arc;

use crate::app_error::AppError;
use crate::federation::ResolveFlags;
use crate::gemini::{Request, Writer};
use crate::server::{Conn, Handler};

use super::{check_edit_throttle, parse_acct};

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;

    let input = req.query_decoded();
    if input.is_empty() {
        writer
            .status(10, "Enter the account to move to (name@domain)")
            .await?;
        return Ok(());
    }

    if viewer.moved_to.is_some() {
        return Err(AppError::bad_input("This account has already moved"));
    }

    check_edit_throttle(viewer, handler.config.min_actor_edit_interval)?;

    let parsed = parse_acct(&input, &handler.domain)?;
    let target = handler
        .resolver
        .resolve(
            &req.key,
            &parsed.host,
            &parsed.name,
            ResolveFlags {
                group_actor: parsed.group_actor,
            },
        )
        .await
        .map_err(|_| AppError::ResolveFail(input.clone()))?;

    if !target.also_known_as_urls().contains(&viewer.id) {
        return Err(AppError::bad_input(format!(
            "{} is not an alias for {}",
            target.id, viewer.id
        )));
    }
    if !viewer.also_known_as_urls().contains(&target.id) {
        return Err(AppError::bad_input(format!(
            "{} is not an alias for {}",
            viewer.id, target.id
        )));
    }

    let mut tx = handler
        .db
        .begin()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    handler
        .outbox
        .move_actor(&mut tx, viewer, &target.id)
        .await
        .map_err(|e| AppError::federation(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    writer
        .redirect(&format!("/users/outbox/{}", super::canonical_id_to_suffix(&target.id)))
        .await
        .map_err(AppError::from)
}
