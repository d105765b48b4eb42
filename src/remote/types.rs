//! Wire mirrors of the remote platform's entities.
//!
//! Only the fields the reconciler consumes are modeled; the platform returns
//! many more, which serde ignores.

use serde::{Deserialize, Serialize};

/// A remote channel row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub is_channel: bool,
    pub is_archived: bool,
}

/// A remote user group. A nonzero `delete_time` marks a deactivated group;
/// these remain discoverable through the listing API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subteam {
    pub id: String,
    pub handle: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "date_delete")]
    pub delete_time: u64,
    pub users: Vec<String>,
    pub prefs: SubteamPrefs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubteamPrefs {
    pub channels: Vec<String>,
}
