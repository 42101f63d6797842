use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An assignee embedded directly on a task or tag document. This denormalized
/// pair is the source of truth for "who is this task for"; the parallel
/// `assignedUserIds` list is a legacy shape that still exists in older
/// documents and must keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedUser {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "not-started")]
    NotStarted,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A task document in the `tasks` collection.
///
/// Lifecycle state is encoded by the `archived`/`deleted` flags plus their
/// timestamp pairs. The flags are independent booleans; views treat `deleted`
/// as overriding `archived`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<Status>,
    /// Denormalized tag (project) name. Tags are referenced by name, not id;
    /// deleting a tag leaves this string dangling.
    #[serde(default)]
    pub tag: Option<String>,
    pub owner_id: String,
    #[serde(default)]
    pub assigned_users: Vec<AssignedUser>,
    /// Legacy parallel id list; may be absent on newer documents.
    #[serde(default)]
    pub assigned_user_ids: Option<Vec<String>>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub reminder: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}
