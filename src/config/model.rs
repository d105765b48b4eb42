//! Typed value objects for the merged configuration.
//!
//! These are deterministic in-memory contracts between the loader and the
//! planner. They carry no I/O; validation beyond serde shape happens in the
//! loader's merge steps.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::config::restrictions::Restriction;

/// The merged desired state for one workspace.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// User name → platform-assigned user id (exactly 9 characters).
    pub users: HashMap<String, String>,
    pub channels: Vec<Channel>,
    pub usergroups: Vec<Usergroup>,
    pub channel_template: ChannelTemplate,
    pub restrictions: Vec<Restriction>,
}

/// A channel declaration. `name` is the logical key in config; `id` (when
/// set) is the stable physical key at the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Channel {
    pub name: String,
    pub id: String,
    pub archived: bool,
    pub moderators: Vec<String>,
}

/// A user-group declaration, keyed by its unique handle (`name`).
///
/// When `external` is set only the handle is required; the group's contents
/// are managed outside this tool and only its existence is recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Usergroup {
    pub name: String,
    pub long_name: String,
    pub description: String,
    pub members: Vec<String>,
    pub channels: Vec<String>,
    pub external: bool,
}

/// Settings applied to newly created channels. Never applied retroactively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelTemplate {
    pub topic: String,
    pub purpose: String,
    pub pins: Vec<String>,
}

impl ChannelTemplate {
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty() && self.topic.is_empty() && self.purpose.is_empty()
    }
}

impl Config {
    /// Convert a list of user names to their platform ids, preserving order.
    ///
    /// Fails atomically, naming every unknown user in one error.
    pub fn names_to_ids(&self, names: &[String]) -> Result<Vec<String>> {
        let mut result = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for n in names {
            match self.users.get(n) {
                Some(id) => result.push(id.clone()),
                None => missing.push(n.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(anyhow!("unknown user names: {}", missing.join(", ")));
        }
        Ok(result)
    }
}
