//! `/users/follow/<…>` and `/users/unfollow/<…>` — the Follow state
//! machine's `pending/accepted → …` and `accepted → removed` transitions.
//! Both routes resolve the capture group against a locally-known actor
//! rather than the Resolver: by the time a viewer reaches either link the
//! target has already been resolved once, via `/users/resolve` or an
//! outbox page.

use std::sync::Arc;

use crate::app_error::AppError;
use crate::gemini::{Request, Writer};
use crate::models::{Actor, Follow};
use crate::server::{Conn, Handler};

pub async fn follow(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;
    let suffix = caps.first().cloned().unwrap_or_default();
    let target_id = super::suffix_to_canonical_id(&suffix);

    let target = Actor::find_by_id(&handler.db, &target_id)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?
        .ok_or_else(|| AppError::not_found("User"))?;

    if Actor::count_accepted_or_pending_follows(&handler.db, &viewer.id)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?
        >= handler.config.max_follows_per_user
    {
        return Err(AppError::bad_input("Following too many users"));
    }

    if Follow::find(&handler.db, &viewer.id, &target.id)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?
        .is_some()
    {
        return Err(AppError::bad_input("Already following this user"));
    }

    let mut tx = handler
        .db
        .begin()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    handler
        .outbox
        .follow(&mut tx, viewer, &target)
        .await
        .map_err(|e| AppError::federation(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    writer
        .redirect(&format!("/users/outbox/{suffix}"))
        .await
        .map_err(AppError::from)
}

pub async fn unfollow(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;
    let suffix = caps.first().cloned().unwrap_or_default();
    let target_id = super::suffix_to_canonical_id(&suffix);

    let follow = Follow::find(&handler.db, &viewer.id, &target_id)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?
        .ok_or_else(|| AppError::not_found("Follow"))?;

    let mut tx = handler
        .db
        .begin()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    handler
        .outbox
        .unfollow(&mut tx, &follow)
        .await
        .map_err(|e| AppError::federation(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    writer
        .redirect(&format!("/users/outbox/{suffix}"))
        .await
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_roundtrips_through_canonical_id() {
        let id = super::super::suffix_to_canonical_id("other.example/user/bob");
        assert_eq!(id, "https://other.example/user/bob");
        assert_eq!(super::super::canonical_id_to_suffix(&id), "other.example/user/bob");
    }
}
