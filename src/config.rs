use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

/// Which set of actors counts as a "local community" for `/users/communities`.
///
/// Two historical definitions exist (filter by `host = Domain`, or by the
/// actor holding a locally-generated signing key); this defaults to the
/// signing-key definition and keeps `Domain` around for operators who want
/// the other behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityScope {
    Domain,
    SignedLocally,
}

impl Default for CommunityScope {
    fn default() -> Self {
        CommunityScope::SignedLocally
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    pub db_url: String,
    pub db_max_connections: u32,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub db_acquire_timeout: Duration,

    /// Server hostname used to build canonical actor/note URLs.
    pub domain: String,
    /// Interface and port the Gemini listener binds to, e.g. `0.0.0.0:1965`.
    pub bind_addr: String,
    pub tls_cert_path: String,
    pub tls_key_path: String,

    /// Page size for outbox, fts, and firehose pagination.
    pub posts_per_page: i64,
    /// Quota enforced by `/users/follow`.
    pub max_follows_per_user: i64,
    /// Minimum interval between `alias`/`move` mutations on the same actor.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub min_actor_edit_interval: Duration,

    #[serde(default)]
    pub community_scope: CommunityScope,
}

impl AppConfig {
    pub fn new_from_file_and_env(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("murmur"))
            .build()
            .and_then(|cfg| cfg.try_deserialize::<Self>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn community_scope_defaults_to_signed_locally() {
        assert_eq!(CommunityScope::default(), CommunityScope::SignedLocally);
    }
}
