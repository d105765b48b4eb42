//! Observed user-group state, fetched once per reconcile.
//!
//! Same shape as the channel cache: canonical rows in one vector, `by_handle`
//! and `by_id` index maps maintained together.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::remote::types::Subteam;
use crate::remote::{call_api, RemoteClient};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UsergroupListing {
    usergroups: Vec<Subteam>,
}

/// In-memory index of the workspace's user groups, deactivated ones
/// included.
#[derive(Debug, Default)]
pub struct UsergroupState {
    groups: Vec<Subteam>,
    by_handle: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl UsergroupState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every user group, members included, disabled included.
    pub fn init(&mut self, client: &dyn RemoteClient, cancel: &CancelToken) -> Result<()> {
        let listing: UsergroupListing = call_api(
            client,
            cancel,
            "usergroups.list",
            json!({"include_users": true, "include_disabled": true}),
        )
        .context("couldn't get usergroup list")?;
        for group in listing.usergroups {
            self.insert(group);
        }
        debug!(groups = self.groups.len(), "loaded usergroup state");
        Ok(())
    }

    /// Index a group, typically one just created at the remote.
    pub fn insert(&mut self, group: Subteam) {
        let index = self.groups.len();
        self.by_handle.insert(group.handle.clone(), index);
        if !group.id.is_empty() {
            self.by_id.insert(group.id.clone(), index);
        }
        self.groups.push(group);
    }

    pub fn get_by_handle(&self, handle: &str) -> Option<&Subteam> {
        self.by_handle.get(handle).map(|&i| &self.groups[i])
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Subteam> {
        self.by_id.get(id).map(|&i| &self.groups[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subteam> {
        self.groups.iter()
    }
}
