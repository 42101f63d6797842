use serde::{Deserialize, Serialize};

/// A user profile document in the `users` collection. The `_id` is the uid
/// referenced by legacy `assignedUserIds` lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub password: String,
}
