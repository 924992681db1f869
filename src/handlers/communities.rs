//! `/users/communities` — local Group actors ordered by recency of
//! activity. "Local" itself has two historical definitions:
//! `AppConfig::community_scope` picks between them.

use std::sync::Arc;

use crate::actor_display::actor_display_name;
use crate::app_error::AppError;
use crate::config::CommunityScope;
use crate::gemini::{Request, Writer};
use crate::models::{Note, Share};
use crate::server::{Conn, Handler};

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    _req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let domain_scope = match handler.config.community_scope {
        CommunityScope::Domain => Some(handler.domain.as_str()),
        CommunityScope::SignedLocally => None,
    };

    let groups = crate::models::Actor::list_local_groups(&handler.db, domain_scope)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    let mut ranked = Vec::with_capacity(groups.len());
    for group in groups {
        let note_epoch = Note::latest_authored_epoch(&handler.db, &group.id)
            .await
            .map_err(|e| AppError::storage(e.to_string()))?;
        let share_epoch = Share::latest_by_epoch(&handler.db, &group.id)
            .await
            .map_err(|e| AppError::storage(e.to_string()))?;
        let latest = note_epoch.into_iter().chain(share_epoch).max();
        ranked.push((group, latest));
    }
    ranked.sort_by_key(|(_, latest)| std::cmp::Reverse(latest.unwrap_or(i64::MIN)));

    writer.ok().await?;
    writer.title("Communities").await?;
    writer.empty().await?;

    if ranked.is_empty() {
        writer.text("No communities").await?;
        return Ok(());
    }

    for (group, _) in &ranked {
        let suffix = super::canonical_id_to_suffix(&group.id);
        writer
            .link(&format!("/users/outbox/{suffix}"), &actor_display_name(group))
            .await?;
    }

    Ok(())
}
