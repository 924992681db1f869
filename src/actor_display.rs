//! Render a remote or local actor's name/summary into plain text lines plus
//! extracted links, for use by handlers that print an actor onto a Gemini
//! response (the outbox header, follower lists, and so on). Never renders
//! HTML; it only strips it down to the plain text and link set a
//! line-oriented protocol can show.

use std::collections::BTreeSet;

use regex::Regex;

use crate::models::{Actor, ActorType};

/// `name` if set; otherwise `preferredUsername`; otherwise the last path
/// segment of `id`. Group actors get a leading `!`.
pub fn actor_display_name(actor: &Actor) -> String {
    let base = actor
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if !actor.preferred_username.is_empty() {
                actor.preferred_username.clone()
            } else {
                actor
                    .id
                    .rsplit('/')
                    .next()
                    .unwrap_or(&actor.id)
                    .to_string()
            }
        });

    if actor.r#type == ActorType::Group {
        format!("!{base}")
    } else {
        base
    }
}

/// Plain text lines (HTML stripped, capped at `max_lines`) plus a
/// deduplicated, insertion-ordered set of `(url, label)` pairs extracted
/// from simple HTML-flavoured `summary` input.
pub fn text_and_links(summary: &str, max_lines: usize, max_link_len: usize) -> (Vec<String>, Vec<(String, String)>) {
    let anchor = Regex::new(r#"(?is)<a\s+[^>]*href=["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap();
    let block_break = Regex::new(r"(?is)</p>|<br\s*/?>|</div>|</li>").unwrap();
    let tag = Regex::new(r"(?is)<[^>]+>").unwrap();
    let ws = Regex::new(r"[ \t]+").unwrap();

    let mut links = Vec::new();
    let mut seen = BTreeSet::new();

    let with_link_placeholders = anchor.replace_all(summary, |caps: &regex::Captures| {
        let url = caps[1].trim().to_string();
        let mut label = tag.replace_all(&caps[2], "").trim().to_string();
        if label.is_empty() {
            label = url.clone();
        }
        if label.chars().count() > max_link_len {
            label = label.chars().take(max_link_len.saturating_sub(1)).collect::<String>() + "\u{2026}";
        }
        if seen.insert(url.clone()) {
            links.push((url, label.clone()));
        }
        label
    });

    let with_breaks = block_break.replace_all(&with_link_placeholders, "\n");
    let stripped = tag.replace_all(&with_breaks, "");

    let lines: Vec<String> = stripped
        .lines()
        .map(|l| ws.replace_all(l.trim(), " ").to_string())
        .filter(|l| !l.is_empty())
        .take(max_lines)
        .collect();

    (lines, links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn actor(name: Option<&str>, username: &str, id: &str, r#type: ActorType) -> Actor {
        Actor {
            id: id.to_string(),
            host: "srv".to_string(),
            r#type,
            preferred_username: username.to_string(),
            name: name.map(str::to_string),
            summary: None,
            followers: format!("{id}/followers"),
            also_known_as: json!([]),
            moved_to: None,
            manually_approves_followers: false,
            discoverable: true,
            published: Utc::now(),
            updated: Utc::now(),
            client_certificate: None,
            public_key: "pub".to_string(),
            private_key: None,
        }
    }

    #[test]
    fn prefers_name_over_username() {
        let a = actor(Some("Alice"), "alice", "https://srv/user/alice", ActorType::Person);
        assert_eq!(actor_display_name(&a), "Alice");
    }

    #[test]
    fn falls_back_to_preferred_username() {
        let a = actor(None, "alice", "https://srv/user/alice", ActorType::Person);
        assert_eq!(actor_display_name(&a), "alice");
    }

    #[test]
    fn falls_back_to_last_id_segment_when_username_empty() {
        let a = actor(None, "", "https://srv/user/alice", ActorType::Person);
        assert_eq!(actor_display_name(&a), "alice");
    }

    #[test]
    fn group_actors_get_a_leading_bang() {
        let a = actor(Some("Gardeners"), "gardeners", "https://srv/group/gardeners", ActorType::Group);
        assert_eq!(actor_display_name(&a), "!Gardeners");
    }

    #[test]
    fn extracts_links_and_dedupes_them_in_order() {
        let html = r#"<p>Hi, visit <a href="https://a.example">A</a> and
            <a href="https://b.example">B</a> again <a href="https://a.example">A again</a>.</p>"#;
        let (lines, links) = text_and_links(html, 10, 30);
        assert!(!lines.is_empty());
        assert_eq!(
            links,
            vec![
                ("https://a.example".to_string(), "A".to_string()),
                ("https://b.example".to_string(), "B".to_string()),
            ]
        );
    }

    #[test]
    fn truncates_long_labels_to_max_link_len() {
        let html = r#"<a href="https://a.example">this label is much too long to fit</a>"#;
        let (_, links) = text_and_links(html, 10, 10);
        assert_eq!(links[0].1.chars().count(), 10);
        assert!(links[0].1.ends_with('\u{2026}'));
    }

    #[test]
    fn caps_number_of_lines() {
        let html = "line one<br>line two<br>line three<br>line four";
        let (lines, _) = text_and_links(html, 2, 100);
        assert_eq!(lines.len(), 2);
    }
}
