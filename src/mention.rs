// src/mention.rs
//
// Parses @name tokens out of message content against the assignee directory.
// Matching is by display name only and best-effort: duplicate display names
// across tags are not disambiguated.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::AssignedUser;

static MENTION_RE: OnceLock<Regex> = OnceLock::new();

fn mention_re() -> &'static Regex {
    MENTION_RE.get_or_init(|| Regex::new(r"@(\S+)").expect("mention pattern"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct MentionResult {
    /// Resolved recipient emails, deduplicated case-insensitively.
    pub mentions: Vec<String>,
    /// Content with each matched token rewritten to the canonical display
    /// name. Unmatched tokens are left verbatim.
    pub formatted_content: String,
}

pub fn extract_mentions(content: &str, directory: &[AssignedUser]) -> MentionResult {
    let mut mentions: Vec<String> = Vec::new();
    let mut formatted_content = content.to_string();

    for caps in mention_re().captures_iter(content) {
        let mentioned = &caps[1];
        let user = directory
            .iter()
            .find(|u| u.display_name.eq_ignore_ascii_case(mentioned));
        let user = match user {
            Some(user) if !user.email.is_empty() => user,
            _ => continue,
        };
        let already = mentions
            .iter()
            .any(|m| m.eq_ignore_ascii_case(&user.email));
        if !already {
            mentions.push(user.email.clone());
            formatted_content = formatted_content.replacen(
                &format!("@{}", mentioned),
                &format!("@{}", user.display_name),
                1,
            );
        }
    }

    MentionResult {
        mentions,
        formatted_content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Vec<AssignedUser> {
        vec![
            AssignedUser {
                email: "a@x.com".to_string(),
                display_name: "Alice".to_string(),
            },
            AssignedUser {
                email: "b@x.com".to_string(),
                display_name: "Bob".to_string(),
            },
        ]
    }

    #[test]
    fn matching_mention_resolves_and_keeps_content() {
        let result = extract_mentions("@Alice please review", &directory());
        assert_eq!(result.mentions, vec!["a@x.com"]);
        assert_eq!(result.formatted_content, "@Alice please review");
    }

    #[test]
    fn unknown_mention_is_left_verbatim() {
        let result = extract_mentions("@Unknown hi", &directory());
        assert!(result.mentions.is_empty());
        assert_eq!(result.formatted_content, "@Unknown hi");
    }

    #[test]
    fn case_differences_are_canonicalized() {
        let result = extract_mentions("ping @alice about this", &directory());
        assert_eq!(result.mentions, vec!["a@x.com"]);
        assert_eq!(result.formatted_content, "ping @Alice about this");
    }

    #[test]
    fn repeated_mentions_are_deduplicated() {
        let result = extract_mentions("@Alice and again @ALICE", &directory());
        assert_eq!(result.mentions, vec!["a@x.com"]);
    }

    #[test]
    fn multiple_users_each_resolve_once() {
        let result = extract_mentions("@Alice meet @Bob", &directory());
        assert_eq!(result.mentions, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn empty_directory_yields_no_mentions() {
        let result = extract_mentions("@Alice hi", &[]);
        assert!(result.mentions.is_empty());
        assert_eq!(result.formatted_content, "@Alice hi");
    }
}
