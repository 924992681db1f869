//! Idempotent side-effecting mutations that both update local database state
//! and enqueue federated activities. Handlers call these inside a
//! transaction they own; the internal queueing storage here is this
//! collaborator's own business, not a core table, since actual delivery of
//! queued activities is out of scope.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{query, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Actor, Follow, FollowState};

#[async_trait]
pub trait Outbox: Send + Sync {
    async fn follow(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        follower: &Actor,
        followed: &Actor,
    ) -> Result<Follow>;

    async fn unfollow(&self, tx: &mut Transaction<'_, Postgres>, follow: &Follow) -> Result<()>;

    async fn accept(&self, tx: &mut Transaction<'_, Postgres>, follow: &Follow) -> Result<()>;

    async fn reject(&self, tx: &mut Transaction<'_, Postgres>, follow: &Follow) -> Result<()>;

    async fn update_actor(&self, tx: &mut Transaction<'_, Postgres>, actor: &Actor) -> Result<()>;

    async fn move_actor(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        from: &Actor,
        to: &str,
    ) -> Result<()>;
}

pub struct QueueOutbox;

impl QueueOutbox {
    pub fn new() -> Self {
        QueueOutbox
    }

    async fn enqueue(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: &str,
        payload: Value,
    ) -> Result<()> {
        query("INSERT INTO outgoing_activities (id, kind, payload, inserted) VALUES ($1, $2, $3, now())")
            .bind(Uuid::new_v4())
            .bind(kind)
            .bind(payload)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

impl Default for QueueOutbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Outbox for QueueOutbox {
    async fn follow(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        follower: &Actor,
        followed: &Actor,
    ) -> Result<Follow> {
        let id = format!("{}/follow/{}", follower.id, Uuid::new_v4());

        // A local target resolves the request immediately according to its
        // own approval policy; a remote target stays pending until its
        // server's Accept activity arrives over the inbox.
        let accepted: FollowState = if followed.is_local() {
            if followed.manually_approves_followers {
                None
            } else {
                Some(true)
            }
        } else {
            None
        };

        let follow = Follow::insert(tx, &id, &follower.id, &followed.id, accepted).await?;

        self.enqueue(
            tx,
            "Follow",
            json!({"id": id, "actor": follower.id, "object": followed.id}),
        )
        .await?;

        Ok(follow)
    }

    async fn unfollow(&self, tx: &mut Transaction<'_, Postgres>, follow: &Follow) -> Result<()> {
        Follow::delete(tx, &follow.id).await?;
        self.enqueue(
            tx,
            "Undo",
            json!({"object": {"type": "Follow", "id": follow.id, "actor": follow.follower, "object": follow.followed}}),
        )
        .await
    }

    async fn accept(&self, tx: &mut Transaction<'_, Postgres>, follow: &Follow) -> Result<()> {
        Follow::set_accepted(tx, &follow.id, true).await?;
        self.enqueue(
            tx,
            "Accept",
            json!({"object": {"type": "Follow", "id": follow.id}, "actor": follow.followed}),
        )
        .await
    }

    async fn reject(&self, tx: &mut Transaction<'_, Postgres>, follow: &Follow) -> Result<()> {
        Follow::set_accepted(tx, &follow.id, false).await?;
        self.enqueue(
            tx,
            "Reject",
            json!({"object": {"type": "Follow", "id": follow.id}, "actor": follow.followed}),
        )
        .await
    }

    async fn update_actor(&self, tx: &mut Transaction<'_, Postgres>, actor: &Actor) -> Result<()> {
        self.enqueue(
            tx,
            "Update",
            json!({"object": {"type": "Person", "id": actor.id}, "actor": actor.id}),
        )
        .await
    }

    async fn move_actor(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        from: &Actor,
        to: &str,
    ) -> Result<()> {
        Actor::set_moved_to(tx, &from.id, to).await?;
        self.enqueue(
            tx,
            "Move",
            json!({"actor": from.id, "object": from.id, "target": to}),
        )
        .await
    }
}
