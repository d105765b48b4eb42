//! Observed channel state, fetched once per reconcile.
//!
//! Canonical rows live in a single vector; `by_name` and `by_id` are index
//! maps into it and are maintained together on every mutation. Mutations only
//! happen on the single thread driving the reconcile.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::remote::types::Conversation;
use crate::remote::{call_api, RemoteClient};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConversationPage {
    channels: Vec<Conversation>,
    response_metadata: PageMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageMetadata {
    next_cursor: String,
}

/// In-memory index of the workspace's public channels.
#[derive(Debug, Default)]
pub struct ChannelState {
    channels: Vec<Conversation>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all public channels, following pagination cursors until the
    /// remote reports no more pages.
    pub fn init(&mut self, client: &dyn RemoteClient, cancel: &CancelToken) -> Result<()> {
        let mut cursor = String::new();
        loop {
            let mut payload = json!({"limit": "100", "types": "public_channel"});
            if !cursor.is_empty() {
                payload["cursor"] = json!(cursor);
            }
            let page: ConversationPage =
                call_api(client, cancel, "conversations.list", payload)
                    .context("failed to list conversations")?;
            for channel in page.channels {
                self.insert(channel);
            }
            if page.response_metadata.next_cursor.is_empty() {
                break;
            }
            cursor = page.response_metadata.next_cursor;
        }
        debug!(channels = self.channels.len(), "loaded channel state");
        Ok(())
    }

    fn insert(&mut self, channel: Conversation) {
        let index = self.channels.len();
        self.by_name.insert(channel.name.clone(), index);
        if !channel.id.is_empty() {
            self.by_id.insert(channel.id.clone(), index);
        }
        self.channels.push(channel);
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Conversation> {
        self.by_name.get(name).map(|&i| &self.channels[i])
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Conversation> {
        self.by_id.get(id).map(|&i| &self.channels[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.channels.iter()
    }

    /// Record a channel that will be created later in the run. The id stays
    /// empty until the create action reports the remote's row.
    pub fn create(&mut self, name: &str) -> Result<()> {
        if self.by_name.contains_key(name) {
            bail!("can't create channel {name}: name already used");
        }
        self.insert(Conversation {
            name: name.to_string(),
            is_channel: true,
            ..Conversation::default()
        });
        Ok(())
    }

    /// Replace the placeholder for `channel.name` with the remote's actual
    /// row, indexing its id.
    pub fn record_created(&mut self, channel: Conversation) {
        match self.by_name.get(&channel.name).copied() {
            Some(index) => {
                if !channel.id.is_empty() {
                    self.by_id.insert(channel.id.clone(), index);
                }
                self.channels[index] = channel;
            }
            None => self.insert(channel),
        }
    }

    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if self.by_name.contains_key(new) {
            bail!("can't rename {old} to {new}: name already used");
        }
        let index = self
            .by_name
            .remove(old)
            .ok_or_else(|| anyhow!("can't rename {old}: no such channel"))?;
        self.channels[index].name = new.to_string();
        self.by_name.insert(new.to_string(), index);
        Ok(())
    }

    /// Bulk name→id lookup. Fails atomically, listing every unresolved name.
    pub fn names_to_ids(&self, names: &[String]) -> Result<Vec<String>> {
        let mut result = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for n in names {
            match self.get_by_name(n) {
                Some(channel) => result.push(channel.id.clone()),
                None => missing.push(n.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(anyhow!("couldn't find channel IDs: {}", missing.join(", ")));
        }
        Ok(result)
    }
}
