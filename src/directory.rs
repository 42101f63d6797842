// src/directory.rs
//
// Resolves tag (project) assignments to {email, displayName} pairs. Two
// historical document shapes coexist in the `tags` collection: embedded
// `assignedUsers` records and bare `assignedUserIds` lists that need a join
// against `users`. No migration is run, so both stay supported.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::StreamExt;
use log::{error, info, warn};
use mongodb::bson::doc;
use tokio::sync::watch;

use crate::models::{AssignedUser, Tag, UserProfile};
use crate::store::{DirectoryReader, MongoDB};

/// Placeholder display name for uids with no profile document.
const FALLBACK_DISPLAY_NAME: &str = "ユーザー";

fn assignee_from_profile(uid: &str, profile: Option<&UserProfile>) -> AssignedUser {
    match profile {
        Some(profile) => AssignedUser {
            email: if profile.email.is_empty() {
                uid.to_string()
            } else {
                profile.email.clone()
            },
            display_name: if profile.display_name.is_empty() {
                FALLBACK_DISPLAY_NAME.to_string()
            } else {
                profile.display_name.clone()
            },
        },
        None => AssignedUser {
            email: uid.to_string(),
            display_name: FALLBACK_DISPLAY_NAME.to_string(),
        },
    }
}

async fn resolve_profile<R: DirectoryReader>(reader: &R, uid: &str) -> AssignedUser {
    match reader.profile_by_id(uid).await {
        Ok(Some(profile)) => assignee_from_profile(uid, Some(&profile)),
        Ok(None) => {
            warn!("No profile for assigned user {}", uid);
            assignee_from_profile(uid, None)
        }
        Err(e) => {
            error!("Failed to load profile for {}: {}", uid, e);
            assignee_from_profile(uid, None)
        }
    }
}

/// Looks a tag up by name first (the UI references tags by name), then by id
/// (legacy direct references), and canonicalizes its assignment list to
/// embedded records. Returns an empty list when the tag is missing by either
/// key or any lookup fails.
pub async fn resolve_tag_assignees<R: DirectoryReader>(
    reader: &R,
    tag_ref: &str,
) -> Vec<AssignedUser> {
    let tag = match reader.tag_by_name(tag_ref).await {
        Ok(Some(tag)) => Some(tag),
        Ok(None) => match reader.tag_by_id(tag_ref).await {
            Ok(found) => found,
            Err(e) => {
                error!("Failed to look up tag {} by id: {}", tag_ref, e);
                return Vec::new();
            }
        },
        Err(e) => {
            error!("Failed to look up tag {} by name: {}", tag_ref, e);
            return Vec::new();
        }
    };
    let tag = match tag {
        Some(tag) => tag,
        None => {
            info!("Tag not found: {}", tag_ref);
            return Vec::new();
        }
    };

    // Embedded records are authoritative when present.
    if !tag.assigned_users.is_empty() {
        return tag.assigned_users;
    }
    let mut users = Vec::with_capacity(tag.assigned_user_ids.len());
    for uid in &tag.assigned_user_ids {
        users.push(resolve_profile(reader, uid).await);
    }
    users
}

/// Drops later entries whose email matches an earlier one case-insensitively.
pub fn dedupe_by_email(users: Vec<AssignedUser>) -> Vec<AssignedUser> {
    let mut seen: Vec<String> = Vec::new();
    let mut unique = Vec::new();
    for user in users {
        let key = user.email.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            unique.push(user);
        }
    }
    unique
}

/// Process-wide cache of every id-resolved assignee across all tags, used by
/// the mention resolver. One writer (the refresh task); readers clone a
/// snapshot, so a refresh mid-read only ever yields stale data, never a torn
/// list.
pub struct AssigneeDirectory {
    users: RwLock<Vec<AssignedUser>>,
    loaded_tx: watch::Sender<bool>,
}

impl AssigneeDirectory {
    pub fn new() -> Self {
        let (loaded_tx, _) = watch::channel(false);
        AssigneeDirectory {
            users: RwLock::new(Vec::new()),
            loaded_tx,
        }
    }

    /// Current assignee list, waiting for the initial load to complete first.
    pub async fn snapshot(&self) -> Vec<AssignedUser> {
        let mut rx = self.loaded_tx.subscribe();
        if !*rx.borrow() {
            let _ = rx.wait_for(|loaded| *loaded).await;
        }
        self.users.read().unwrap().clone()
    }

    /// Rebuilds the cache from the `tags` collection. A failed scan keeps the
    /// previous contents.
    pub async fn refresh(&self, db: &MongoDB) {
        let tags = db.db.collection::<Tag>("tags");
        let mut cursor = match tags.find(doc! {}).await {
            Ok(cursor) => cursor,
            Err(e) => {
                error!("Failed to scan tags for the assignee directory: {}", e);
                return;
            }
        };

        // Both stored shapes feed the cache: embedded records as-is, legacy
        // uid lists resolved against `users`.
        let mut users: Vec<AssignedUser> = Vec::new();
        let mut uids: Vec<String> = Vec::new();
        while let Some(result) = cursor.next().await {
            match result {
                Ok(tag) => {
                    users.extend(tag.assigned_users);
                    uids.extend(tag.assigned_user_ids);
                }
                Err(e) => {
                    error!("Failed to read tag while refreshing directory: {}", e);
                    return;
                }
            }
        }
        for uid in &uids {
            users.push(resolve_profile(db, uid).await);
        }
        let users = dedupe_by_email(users);
        info!("Assignee directory refreshed: {} user(s)", users.len());
        *self.users.write().unwrap() = users;
        self.loaded_tx.send_replace(true);
    }
}

/// Stands in for a store change stream: reloads the directory on an
/// interval, starting with one immediate load.
pub async fn run_directory_refresher(
    directory: Arc<AssigneeDirectory>,
    db: Arc<MongoDB>,
    interval_secs: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        directory.refresh(&db).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use chrono::Utc;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapReader {
        tags_by_name: HashMap<String, Tag>,
        tags_by_id: HashMap<String, Tag>,
        profiles: HashMap<String, UserProfile>,
    }

    impl DirectoryReader for MapReader {
        async fn tag_by_name(&self, name: &str) -> Result<Option<Tag>, StoreError> {
            Ok(self.tags_by_name.get(name).cloned())
        }

        async fn tag_by_id(&self, id: &str) -> Result<Option<Tag>, StoreError> {
            Ok(self.tags_by_id.get(id).cloned())
        }

        async fn profile_by_id(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
            Ok(self.profiles.get(uid).cloned())
        }
    }

    fn tag(name: &str, uids: &[&str], embedded: Vec<AssignedUser>) -> Tag {
        Tag {
            id: format!("{}-id", name),
            name: name.to_string(),
            owner_id: Some("owner-1".to_string()),
            assigned_user_ids: uids.iter().map(|s| s.to_string()).collect(),
            assigned_users: embedded,
            order: 0,
            created_at: Utc::now(),
        }
    }

    fn profile(uid: &str, email: &str, name: &str) -> UserProfile {
        UserProfile {
            id: uid.to_string(),
            email: email.to_string(),
            display_name: name.to_string(),
            password: "hash".to_string(),
        }
    }

    fn user(email: &str, name: &str) -> AssignedUser {
        AssignedUser {
            email: email.to_string(),
            display_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn embedded_records_win_over_the_id_list() {
        let mut reader = MapReader::default();
        reader.profiles.insert("u1".into(), profile("u1", "joined@x.com", "Joined"));
        reader.tags_by_name.insert(
            "work".into(),
            tag("work", &["u1"], vec![user("embedded@x.com", "Embedded")]),
        );
        let resolved = resolve_tag_assignees(&reader, "work").await;
        assert_eq!(resolved, vec![user("embedded@x.com", "Embedded")]);
    }

    #[tokio::test]
    async fn id_list_is_joined_against_profiles_when_no_embedded_records() {
        let mut reader = MapReader::default();
        reader.profiles.insert("u1".into(), profile("u1", "a@x.com", "Alice"));
        reader.tags_by_name.insert("work".into(), tag("work", &["u1", "u2"], Vec::new()));
        let resolved = resolve_tag_assignees(&reader, "work").await;
        assert_eq!(
            resolved,
            vec![user("a@x.com", "Alice"), user("u2", "ユーザー")]
        );
    }

    #[tokio::test]
    async fn name_lookup_beats_id_lookup() {
        let mut reader = MapReader::default();
        reader.tags_by_name.insert(
            "work".into(),
            tag("work", &[], vec![user("by-name@x.com", "ByName")]),
        );
        reader.tags_by_id.insert(
            "work".into(),
            tag("other", &[], vec![user("by-id@x.com", "ById")]),
        );
        let resolved = resolve_tag_assignees(&reader, "work").await;
        assert_eq!(resolved, vec![user("by-name@x.com", "ByName")]);
    }

    #[tokio::test]
    async fn id_lookup_is_the_fallback() {
        let mut reader = MapReader::default();
        reader.tags_by_id.insert(
            "tag-42".into(),
            tag("sales", &[], vec![user("by-id@x.com", "ById")]),
        );
        let resolved = resolve_tag_assignees(&reader, "tag-42").await;
        assert_eq!(resolved, vec![user("by-id@x.com", "ById")]);
    }

    #[tokio::test]
    async fn missing_tag_resolves_to_an_empty_list() {
        let reader = MapReader::default();
        assert!(resolve_tag_assignees(&reader, "nope").await.is_empty());
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let mut reader = MapReader::default();
        reader.profiles.insert("u1".into(), profile("u1", "a@x.com", "Alice"));
        reader.tags_by_name.insert("work".into(), tag("work", &["u1"], Vec::new()));
        let first = resolve_tag_assignees(&reader, "work").await;
        let second = resolve_tag_assignees(&reader, "work").await;
        assert_eq!(first, second);
    }

    #[test]
    fn dedupe_is_case_insensitive_and_keeps_the_first() {
        let users = vec![
            user("a@x.com", "Alice"),
            user("A@X.COM", "Alice Again"),
            user("b@x.com", "Bob"),
        ];
        let unique = dedupe_by_email(users);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].display_name, "Alice");
        assert_eq!(unique[1].email, "b@x.com");
    }

    #[test]
    fn missing_profile_falls_back_to_uid_and_placeholder() {
        let resolved = assignee_from_profile("uid-123", None);
        assert_eq!(resolved.email, "uid-123");
        assert_eq!(resolved.display_name, "ユーザー");
    }

    #[test]
    fn empty_profile_fields_fall_back_too() {
        let profile = UserProfile {
            id: "uid-9".to_string(),
            email: String::new(),
            display_name: String::new(),
            password: "hash".to_string(),
        };
        let resolved = assignee_from_profile("uid-9", Some(&profile));
        assert_eq!(resolved.email, "uid-9");
        assert_eq!(resolved.display_name, "ユーザー");
    }

    #[test]
    fn full_profile_is_projected_verbatim() {
        let profile = UserProfile {
            id: "uid-1".to_string(),
            email: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
            password: "hash".to_string(),
        };
        let resolved = assignee_from_profile("uid-1", Some(&profile));
        assert_eq!(resolved.email, "alice@example.com");
        assert_eq!(resolved.display_name, "Alice");
    }
}
