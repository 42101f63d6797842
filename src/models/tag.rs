use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::AssignedUser;

/// A tag (project) document in the `tags` collection.
///
/// The assignment relation is stored twice: `assignedUserIds` (uid list,
/// older documents) and `assignedUsers` (embedded email/name pairs, newer
/// documents). Both shapes coexist in the collection and no migration is
/// run, so readers must accept either; `crate::directory` canonicalizes at
/// the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    #[serde(rename = "_id")]
    pub id: String,
    /// Unique per owner, enforced by a pre-insert check rather than an index.
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub assigned_user_ids: Vec<String>,
    #[serde(default)]
    pub assigned_users: Vec<AssignedUser>,
    /// Sidebar position.
    #[serde(default)]
    pub order: i32,
    pub created_at: DateTime<Utc>,
}
