//! `/users/resolve?<urlencoded>` — the front door to the Resolver
//! collaborator: parses `(!?)name(@host)?`, resolves, and redirects into
//! `/users/outbox/<suffix>` on success.

use std::sync::Arc;

use crate::app_error::AppError;
use crate::federation::ResolveFlags;
use crate::gemini::{Request, Writer};
use crate::server::{Conn, Handler};

use super::{canonical_id_to_suffix, parse_acct};

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let input = req.query_decoded();
    if input.is_empty() {
        writer.status(10, "Enter a user to resolve (name or name@domain)").await?;
        return Ok(());
    }

    let parsed = parse_acct(&input, &handler.domain)?;
    let actor = handler
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

    writer
        .redirect(&format!("/users/outbox/{}", canonical_id_to_suffix(&actor.id)))
        .await
        .map_err(AppError::from)
}
