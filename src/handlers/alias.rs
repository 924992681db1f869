//! `/users/alias?<name@domain>` — sets `alsoKnownAs` to a single resolved
//! target, gated by the edit-throttle. This and `move` share the same
//! throttle column (`persons.updated`/`published`) and the same
//! `parse_acct` grammar, but alias is repeatable while move is not.

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
            .status(10, "Enter the account to declare as an alias (name@domain)")
            .await?;
        return Ok(());
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

    let mut tx = handler
        .db
        .begin()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    crate::models::Actor::set_also_known_as(&mut tx, &viewer.id, std::slice::from_ref(&target.id))
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    let mut updated = viewer.clone();
    updated.also_known_as = serde_json::json!([target.id]);
    handler
        .outbox
        .update_actor(&mut tx, &updated)
        .await
        .map_err(|e| AppError::federation(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    writer
        .redirect(&format!("/users/outbox/{}", super::canonical_id_to_suffix(&viewer.id)))
        .await
        .map_err(AppError::from)
}
