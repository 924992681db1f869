use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, PgPool, Postgres, Transaction, Type};

use crate::AppConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "actor_type", rename_all = "PascalCase")]
pub enum ActorType {
    Person,
    Group,
    Service,
    Application,
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorType::Person => write!(f, "Person"),
            ActorType::Group => write!(f, "Group"),
            ActorType::Service => write!(f, "Service"),
            ActorType::Application => write!(f, "Application"),
        }
    }
}

/// An ActivityPub identity, local or remote. `id` is the canonical URL and
/// primary key everywhere in this crate; `host` is kept denormalised since
/// every visibility and resolver query filters on it.
#[derive(Clone, Debug, FromRow, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub host: String,
    #[sqlx(rename = "type")]
    pub r#type: ActorType,
    pub preferred_username: String,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub followers: String,
    /// Stored as a JSON array of actor URLs.
    pub also_known_as: serde_json::Value,
    pub moved_to: Option<String>,
    pub manually_approves_followers: bool,
    pub discoverable: bool,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub client_certificate: Option<String>,
    pub public_key: String,
    pub private_key: Option<String>,
}

const SELECT_ACTOR_COLUMNS: &str = "id, host, type, preferred_username, name, summary, \
    followers, also_known_as, moved_to, manually_approves_followers, discoverable, \
    published, updated, client_certificate, public_key, private_key";

impl Actor {
    /// `true` for actors this server holds a signing key for, i.e. actors it
    /// originates rather than merely caches from federation.
    pub fn is_local(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn also_known_as_urls(&self) -> Vec<String> {
        self.also_known_as
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The timestamp edit-throttled mutations (alias, move) measure against:
    /// `updated` if the actor has ever been edited, else `published`.
    pub fn last_edit(&self) -> DateTime<Utc> {
        self.updated.max(self.published)
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Actor>> {
        let actor = query_as::<_, Actor>(&format!(
            "SELECT {SELECT_ACTOR_COLUMNS} FROM persons WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(actor)
    }

    pub async fn find_by_fingerprint(pool: &PgPool, fingerprint: &str) -> Result<Option<Actor>> {
        let actor = query_as::<_, Actor>(&format!(
            "SELECT {SELECT_ACTOR_COLUMNS} FROM persons WHERE client_certificate = $1"
        ))
        .bind(fingerprint)
        .fetch_optional(pool)
        .await?;
        Ok(actor)
    }

    pub async fn find_by_preferred_username(
        pool: &PgPool,
        host: &str,
        username: &str,
    ) -> Result<Option<Actor>> {
        let actor = query_as::<_, Actor>(&format!(
            "SELECT {SELECT_ACTOR_COLUMNS} FROM persons WHERE host = $1 AND preferred_username = $2"
        ))
        .bind(host)
        .bind(username)
        .fetch_optional(pool)
        .await?;
        Ok(actor)
    }

    /// Local Group actors, for `/users/communities`. Ordering by recency of
    /// activity is done by the handler, which joins against `notes`/`shares`.
    pub async fn list_local_groups(
        pool: &PgPool,
        domain_scope: Option<&str>,
    ) -> Result<Vec<Actor>> {
        let actors = if let Some(domain) = domain_scope {
            query_as::<_, Actor>(&format!(
                "SELECT {SELECT_ACTOR_COLUMNS} FROM persons WHERE type = 'Group' AND host = $1"
            ))
            .bind(domain)
            .fetch_all(pool)
            .await?
        } else {
            query_as::<_, Actor>(&format!(
                "SELECT {SELECT_ACTOR_COLUMNS} FROM persons \
                 WHERE type = 'Group' AND private_key IS NOT NULL"
            ))
            .fetch_all(pool)
            .await?
        };
        Ok(actors)
    }

    /// Create a brand-new local actor in an owning transaction, generating a
    /// fresh ActivityPub signing keypair the way the teacher's
    /// `create_actor_for_user` does.
    pub async fn register(
        tx: &mut Transaction<'_, Postgres>,
        config: &AppConfig,
        username: &str,
        fingerprint: &str,
    ) -> Result<Actor> {
        use activitypub_federation::http_signatures::generate_actor_keypair;

        let keypair = generate_actor_keypair().context("generating actor keypair")?;
        let now = Utc::now();
        let id = format!("https://{}/user/{}", config.domain, username);
        let followers = format!("{id}/followers");

        let actor = query_as::<_, Actor>(&format!(
            "INSERT INTO persons (
                id, host, type, preferred_username, name, summary, followers,
                also_known_as, moved_to, manually_approves_followers, discoverable,
                published, updated, client_certificate, public_key, private_key
             ) VALUES (
                $1, $2, 'Person', $3, NULL, NULL, $4,
                '[]'::jsonb, NULL, false, true,
                $5, $5, $6, $7, $8
             ) RETURNING {SELECT_ACTOR_COLUMNS}"
        ))
        .bind(&id)
        .bind(&config.domain)
        .bind(username)
        .bind(&followers)
        .bind(now)
        .bind(fingerprint)
        .bind(keypair.public_key)
        .bind(keypair.private_key)
        .fetch_one(&mut **tx)
        .await?;

        Ok(actor)
    }

    /// `json_set($.alsoKnownAs, json_array($1), $.updated, now)` from the
    /// spec's `/users/alias` contract, expressed against a jsonb column.
    pub async fn set_also_known_as(
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
        targets: &[String],
    ) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        let json = serde_json::to_value(targets)?;
        query("UPDATE persons SET also_known_as = $2, updated = $3 WHERE id = $1")
            .bind(id)
            .bind(json)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        Ok(now)
    }

    pub async fn set_moved_to(
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
        target: &str,
    ) -> Result<()> {
        query("UPDATE persons SET moved_to = $2, updated = now() WHERE id = $1")
            .bind(id)
            .bind(target)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn set_manually_approves_followers(
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
        value: bool,
    ) -> Result<()> {
        query(
            "UPDATE persons SET manually_approves_followers = $2, updated = now() WHERE id = $1",
        )
        .bind(id)
        .bind(value)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn count_accepted_or_pending_follows(pool: &PgPool, follower: &str) -> Result<i64> {
        let row: (i64,) = query_as(
            "SELECT COUNT(*) FROM follows WHERE follower = $1 AND accepted IS DISTINCT FROM false",
        )
        .bind(follower)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Insert or refresh a remote actor the Resolver fetched. Remote actors
    /// never carry a private key.
    pub async fn upsert_remote(
        pool: &PgPool,
        id: &str,
        host: &str,
        r#type: ActorType,
        preferred_username: &str,
        name: Option<&str>,
        summary: Option<&str>,
        followers: &str,
        public_key: &str,
    ) -> Result<Actor> {
        let now = Utc::now();
        let actor = query_as::<_, Actor>(&format!(
            "INSERT INTO persons (
                id, host, type, preferred_username, name, summary, followers,
                also_known_as, moved_to, manually_approves_followers, discoverable,
                published, updated, client_certificate, public_key, private_key
             ) VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                '[]'::jsonb, NULL, false, true,
                $8, $8, NULL, $9, NULL
             )
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                summary = EXCLUDED.summary,
                updated = EXCLUDED.published
             RETURNING {SELECT_ACTOR_COLUMNS}"
        ))
        .bind(id)
        .bind(host)
        .bind(r#type)
        .bind(preferred_username)
        .bind(name)
        .bind(summary)
        .bind(followers)
        .bind(now)
        .bind(public_key)
        .fetch_one(pool)
        .await?;
        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_actor(also_known_as: serde_json::Value) -> Actor {
        Actor {
            id: "https://srv/user/alice".to_string(),
            host: "srv".to_string(),
            r#type: ActorType::Person,
            preferred_username: "alice".to_string(),
            name: None,
            summary: None,
            followers: "https://srv/user/alice/followers".to_string(),
            also_known_as,
            moved_to: None,
            manually_approves_followers: false,
            discoverable: true,
            published: Utc::now(),
            updated: Utc::now(),
            client_certificate: Some("deadbeef".to_string()),
            public_key: "pub".to_string(),
            private_key: Some("priv".to_string()),
        }
    }

    #[test]
    fn also_known_as_urls_reads_json_array() {
        let actor = sample_actor(json!(["https://other/user/bob"]));
        assert_eq!(
            actor.also_known_as_urls(),
            vec!["https://other/user/bob".to_string()]
        );
    }

    #[test]
    fn also_known_as_urls_empty_for_non_array() {
        let actor = sample_actor(json!(null));
        assert!(actor.also_known_as_urls().is_empty());
    }

    #[test]
    fn is_local_requires_a_private_key() {
        let mut actor = sample_actor(json!([]));
        assert!(actor.is_local());
        actor.private_key = None;
        assert!(!actor.is_local());
    }

    #[test]
    fn last_edit_picks_the_later_timestamp() {
        let mut actor = sample_actor(json!([]));
        actor.published = Utc::now() - chrono::Duration::days(1);
        actor.updated = actor.published;
        let published = actor.published;
        assert_eq!(actor.last_edit(), published);
    }
}
