//! Given `(host, name, flags)`, return a canonical actor, fetching and
//! caching if remote. Only the *interface* needs to be correct for the view
//! handlers that call it; HTTP signature verification and inbox processing
//! on the other side of federation are external collaborators. The concrete
//! `DbResolver` below exists so the crate runs end-to-end.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use sqlx::PgPool;

use crate::gemini::SigningKey;
use crate::models::{Actor, ActorType};

#[derive(Clone, Copy, Debug, Default)]
pub struct ResolveFlags {
    /// Restrict the match to `Group` actors, as `/users/resolve`'s leading
    /// `!` and community-facing callers need.
    pub group_actor: bool,
}

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        key: &SigningKey,
        host: &str,
        name: &str,
        flags: ResolveFlags,
    ) -> Result<Actor>;
}

#[derive(Deserialize)]
struct WebfingerResponse {
    links: Vec<WebfingerLink>,
}

#[derive(Deserialize)]
struct WebfingerLink {
    rel: String,
    #[serde(rename = "type")]
    media_type: Option<String>,
    href: Option<String>,
}

#[derive(Deserialize)]
struct RemoteActorDocument {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "preferredUsername")]
    preferred_username: String,
    name: Option<String>,
    summary: Option<String>,
    followers: Option<String>,
    #[serde(rename = "publicKey")]
    public_key: RemotePublicKey,
}

#[derive(Deserialize)]
struct RemotePublicKey {
    #[serde(rename = "publicKeyPem")]
    public_key_pem: String,
}

/// Caches resolved remote actors in-process (behind this trait; handlers
/// never see or write this cache directly) in addition to the durable copy
/// kept in `persons`.
pub struct DbResolver {
    pool: PgPool,
    client: reqwest::Client,
    domain: String,
    cache: DashMap<(String, String), Actor>,
}

impl DbResolver {
    pub fn new(pool: PgPool, domain: String) -> Arc<Self> {
        Arc::new(DbResolver {
            pool,
            client: reqwest::Client::new(),
            domain,
            cache: DashMap::new(),
        })
    }

    async fn resolve_local(&self, name: &str, flags: ResolveFlags) -> Result<Actor> {
        let actor = Actor::find_by_preferred_username(&self.pool, &self.domain, name)
            .await?
            .ok_or_else(|| anyhow!("no local actor named {name}"))?;
        if flags.group_actor && actor.r#type != ActorType::Group {
            return Err(anyhow!("{name} is not a Group actor"));
        }
        Ok(actor)
    }

    async fn resolve_remote(
        &self,
        host: &str,
        name: &str,
        flags: ResolveFlags,
    ) -> Result<Actor> {
        let cache_key = (host.to_string(), name.to_string());
        if let Some(actor) = self.cache.get(&cache_key) {
            return Ok(actor.clone());
        }

        if let Some(actor) =
            Actor::find_by_preferred_username(&self.pool, host, name).await?
        {
            self.cache.insert(cache_key, actor.clone());
            return Ok(actor);
        }

        let webfinger_url = format!(
            "https://{host}/.well-known/webfinger?resource=acct:{name}@{host}"
        );
        let webfinger: WebfingerResponse = self
            .client
            .get(&webfinger_url)
            .header("Accept", "application/jrd+json")
            .send()
            .await
            .context("webfinger request failed")?
            .json()
            .await
            .context("webfinger response was not valid JRD+JSON")?;

        let actor_url = webfinger
            .links
            .into_iter()
            .find(|l| {
                l.rel == "self"
                    && l.media_type
                        .as_deref()
                        .map(|m| m.contains("activity+json") || m.contains("ld+json"))
                        .unwrap_or(false)
            })
            .and_then(|l| l.href)
            .ok_or_else(|| anyhow!("webfinger response for {name}@{host} has no AP self link"))?;

        let doc: RemoteActorDocument = self
            .client
            .get(&actor_url)
            .header("Accept", "application/activity+json")
            .send()
            .await
            .context("actor fetch failed")?
            .json()
            .await
            .context("actor document was not valid JSON")?;

        let kind = parse_actor_type(&doc.kind)?;
        if flags.group_actor && kind != ActorType::Group {
            return Err(anyhow!("{name}@{host} is not a Group actor"));
        }

        let followers = doc
            .followers
            .unwrap_or_else(|| format!("{}/followers", doc.id));

        let actor = Actor::upsert_remote(
            &self.pool,
            &doc.id,
            host,
            kind,
            &doc.preferred_username,
            doc.name.as_deref(),
            doc.summary.as_deref(),
            &followers,
            &doc.public_key.public_key_pem,
        )
        .await?;

        self.cache.insert(cache_key, actor.clone());
        Ok(actor)
    }
}

fn parse_actor_type(kind: &str) -> Result<ActorType> {
    match kind {
        "Person" => Ok(ActorType::Person),
        "Group" => Ok(ActorType::Group),
        "Service" => Ok(ActorType::Service),
        "Application" => Ok(ActorType::Application),
        other => Err(anyhow!("unrecognised actor type {other}")),
    }
}

#[async_trait]
impl Resolver for DbResolver {
    async fn resolve(
        &self,
        _key: &SigningKey,
        host: &str,
        name: &str,
        flags: ResolveFlags,
    ) -> Result<Actor> {
        if host == self.domain {
            self.resolve_local(name, flags).await
        } else {
            self.resolve_remote(host, name, flags).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_actor_type_rejects_unknown_kinds() {
        assert!(parse_actor_type("Tombstone").is_err());
        assert_eq!(parse_actor_type("Group").unwrap(), ActorType::Group);
    }
}
