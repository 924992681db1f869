//! One module per route family. Each handler has the shape
//! `HandlerFn` expects: `(&Handler, &mut Writer<Conn>, &Request, Vec<String>)
//! -> Result<(), AppError>`. Shared parsing/formatting lives here so every
//! handler reuses it instead of re-deriving it per route.

pub mod alias;
pub mod communities;
pub mod firehose;
pub mod follow;
pub mod followers;
pub mod fts;
pub mod inbox;
pub mod move_actor;
pub mod outbox;
pub mod pending;
pub mod radio;
pub mod register;
pub mod resolve;
pub mod upload;

use regex::Regex;

use crate::app_error::AppError;
use crate::models::Actor;

/// `?<n>` pagination offset used by outbox/fts/firehose; defaults to 0 and
/// never goes negative on malformed input.
pub fn parse_offset(raw_query: &str) -> i64 {
    raw_query.parse::<i64>().unwrap_or(0).max(0)
}

/// A path suffix of the form `host/user/name` (or any opaque remainder)
/// denotes the canonical id `https://<suffix>`.
pub fn suffix_to_canonical_id(suffix: &str) -> String {
    format!("https://{suffix}")
}

/// Strips the scheme from a canonical id for use in a path segment, e.g.
/// for redirecting `/users/resolve` to `/users/outbox/<id-without-scheme>`.
pub fn canonical_id_to_suffix(id: &str) -> String {
    id.trim_start_matches("https://")
        .trim_start_matches("http://")
        .to_string()
}

pub struct ParsedAcct {
    pub group_actor: bool,
    pub name: String,
    pub host: String,
}

/// Parses `/users/resolve`'s and `/users/alias`/`/users/move`'s input against
/// `^(!?)([^@]+)(?:@([^.@]+\.[^@]+))?$`, defaulting an absent host to
/// `local_domain`.
pub fn parse_acct(input: &str, local_domain: &str) -> Result<ParsedAcct, AppError> {
    let re = Regex::new(r"^(!?)([^@]+)(?:@([^.@]+\.[^@]+))?$").unwrap();
    let caps = re
        .captures(input)
        .ok_or_else(|| AppError::bad_input("Malformed actor reference"))?;

    let group_actor = &caps[1] == "!";
    let name = caps[2].to_string();
    let host = caps
        .get(3)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| local_domain.to_string());

    Ok(ParsedAcct {
        group_actor,
        name,
        host,
    })
}

/// `^[A-Za-z0-9_-]{4,32}$`, the username constraint `/users/register` enforces.
pub fn is_valid_username(name: &str) -> bool {
    let len = name.chars().count();
    (4..=32).contains(&len)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// True when `viewer` and `target` are the same actor; used to hide
/// Follow/Unfollow/Message links on a viewer's own outbox page.
pub fn is_self(viewer: Option<&Actor>, target: &Actor) -> bool {
    viewer.map(|v| v.id == target.id).unwrap_or(false)
}

/// Enforces `now >= actor.last_edit() + min_interval` for the edit-sensitive
/// mutations (`alias`, `move`).
pub fn check_edit_throttle(actor: &Actor, min_interval: std::time::Duration) -> Result<(), AppError> {
    let min_interval = chrono::Duration::from_std(min_interval)
        .map_err(|e| AppError::bad_input(format!("invalid throttle interval: {e}")))?;
    let earliest = actor.last_edit() + min_interval;
    if chrono::Utc::now() < earliest {
        return Err(AppError::bad_input(
            "Too soon since your last profile edit, try again later",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_offset_defaults_to_zero() {
        assert_eq!(parse_offset(""), 0);
        assert_eq!(parse_offset("garbage"), 0);
        assert_eq!(parse_offset("10"), 10);
    }

    #[test]
    fn parse_acct_reads_group_marker_and_defaults_host() {
        let parsed = parse_acct("!gardeners", "srv").unwrap();
        assert!(parsed.group_actor);
        assert_eq!(parsed.name, "gardeners");
        assert_eq!(parsed.host, "srv");
    }

    #[test]
    fn parse_acct_reads_explicit_host() {
        let parsed = parse_acct("bob@other.example", "srv").unwrap();
        assert!(!parsed.group_actor);
        assert_eq!(parsed.name, "bob");
        assert_eq!(parsed.host, "other.example");
    }

    #[test]
    fn username_length_bounds_are_enforced() {
        assert!(!is_valid_username("abc"));
        assert!(!is_valid_username(&"a".repeat(33)));
        assert!(!is_valid_username("bad name"));
        assert!(is_valid_username("alice_99"));
    }

    #[test]
    fn edit_throttle_rejects_within_the_interval_and_allows_after() {
        use chrono::Utc;
        use std::time::Duration;

        let mut actor = sample_actor();
        actor.updated = Utc::now();
        assert!(check_edit_throttle(&actor, Duration::from_secs(3600)).is_err());

        actor.updated = Utc::now() - chrono::Duration::hours(2);
        actor.published = actor.updated;
        assert!(check_edit_throttle(&actor, Duration::from_secs(3600)).is_ok());
    }

    fn sample_actor() -> Actor {
        use crate::models::ActorType;
        Actor {
            id: "https://srv/user/alice".to_string(),
            host: "srv".to_string(),
            r#type: ActorType::Person,
            preferred_username: "alice".to_string(),
            name: None,
            summary: None,
            followers: "https://srv/user/alice/followers".to_string(),
            also_known_as: serde_json::json!([]),
            moved_to: None,
            manually_approves_followers: false,
            discoverable: true,
            published: chrono::Utc::now(),
            updated: chrono::Utc::now(),
            client_certificate: None,
            public_key: "pub".to_string(),
            private_key: None,
        }
    }
}
