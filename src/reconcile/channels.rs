//! Channel diffing and the channel-side actions.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::reconcile::actions::{Action, ApplyCtx};
use crate::reconcile::channel_state::ChannelState;
use crate::remote::call_api;
use crate::remote::types::Conversation;

/// Diff configured channels against the observed state.
///
/// Emits actions in config declaration order. Renames mutate the cache so
/// later lookups (including user-group planning) see the new names, and a
/// planned create leaves a placeholder behind for the same reason. Remote
/// channels the config never mentions become errors; deletion is never
/// implicit.
pub fn plan_channels(config: &Config, state: &mut ChannelState) -> (Vec<Action>, Vec<anyhow::Error>) {
    let mut missing: BTreeMap<String, String> = state
        .iter()
        .map(|c| (c.name.clone(), c.id.clone()))
        .collect();

    let mut actions = Vec::new();
    let mut errors = Vec::new();

    for c in &config.channels {
        if !c.moderators.is_empty() {
            if let Err(err) = config.names_to_ids(&c.moderators) {
                errors.push(anyhow!("channel {} moderators: {err}", c.name));
            }
        }

        if !c.id.is_empty() {
            match state.get_by_id(&c.id).map(|r| r.name.clone()) {
                Some(old_name) if old_name != c.name => {
                    match state.rename(&old_name, &c.name) {
                        Ok(()) => actions.push(Action::RenameChannel(RenameChannel {
                            id: c.id.clone(),
                            old_name: old_name.clone(),
                            new_name: c.name.clone(),
                        })),
                        Err(err) => errors.push(err),
                    }
                    missing.remove(&old_name);
                }
                Some(_) => {}
                None => errors.push(anyhow!(
                    "channel ID {} (for channel named {}) specified, but not known to the workspace",
                    c.id,
                    c.name
                )),
            }
        }

        match state.get_by_name(&c.name).map(|r| (r.id.clone(), r.name.clone(), r.is_archived)) {
            Some((id, name, is_archived)) => {
                if c.archived && !is_archived {
                    actions.push(Action::ArchiveChannel(ArchiveChannel { id, name }));
                } else if !c.archived && is_archived {
                    actions.push(Action::UnarchiveChannel(UnarchiveChannel { id, name }));
                }
                missing.remove(&c.name);
            }
            None => {
                if c.archived {
                    errors.push(anyhow!(
                        "can't create channel {} in archived state",
                        c.name
                    ));
                } else {
                    match state.create(&c.name) {
                        Ok(()) => actions.push(Action::CreateChannel(CreateChannel {
                            name: c.name.clone(),
                        })),
                        Err(err) => errors.push(err),
                    }
                }
            }
        }
    }

    for (name, id) in missing {
        errors.push(anyhow!("channel {name} ({id}) not referenced in config"));
    }

    (actions, errors)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateChannel {
    pub name: String,
}

impl CreateChannel {
    pub fn describe(&self) -> String {
        format!("Create new channel: {}", self.name)
    }

    /// Create the channel, then apply the workspace template: topic, purpose,
    /// and one pinned message per template pin. A failure partway leaves the
    /// channel created.
    pub fn apply(&self, ctx: &mut ApplyCtx) -> Result<()> {
        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct Created {
            channel: Conversation,
        }
        let created: Created = call_api(
            ctx.client,
            ctx.cancel,
            "conversations.create",
            json!({"name": self.name}),
        )
        .context("failed to create channel")?;
        let channel = created.channel;
        ctx.channels.record_created(channel.clone());

        let template = &ctx.config.channel_template;
        if !template.topic.is_empty() {
            let _: Value = call_api(
                ctx.client,
                ctx.cancel,
                "conversations.setTopic",
                json!({"channel": channel.id, "topic": template.topic}),
            )
            .with_context(|| {
                format!(
                    "failed to set topic of channel {} to {:?}",
                    channel.name, template.topic
                )
            })?;
        }
        if !template.purpose.is_empty() {
            let _: Value = call_api(
                ctx.client,
                ctx.cancel,
                "conversations.setPurpose",
                json!({"channel": channel.id, "purpose": template.purpose}),
            )
            .with_context(|| {
                format!(
                    "failed to set purpose of channel {} to {:?}",
                    channel.name, template.purpose
                )
            })?;
        }
        for pin in &template.pins {
            #[derive(Debug, Default, Deserialize)]
            #[serde(default)]
            struct Posted {
                ts: String,
            }
            let posted: Posted = call_api(
                ctx.client,
                ctx.cancel,
                "chat.postMessage",
                json!({
                    "channel": channel.id,
                    "text": pin,
                    "as_user": false,
                    "link_names": true,
                }),
            )
            .context("failed to send message")?;
            let _: Value = call_api(
                ctx.client,
                ctx.cancel,
                "pins.add",
                json!({"channel": channel.id, "timestamp": posted.ts}),
            )
            .with_context(|| {
                format!("failed to pin message {} in {}", posted.ts, channel.name)
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameChannel {
    pub id: String,
    pub old_name: String,
    pub new_name: String,
}

impl RenameChannel {
    pub fn describe(&self) -> String {
        format!(
            "Rename channel {} from {} to {}",
            self.id, self.old_name, self.new_name
        )
    }

    pub fn apply(&self, ctx: &mut ApplyCtx) -> Result<()> {
        let _: Value = call_api(
            ctx.client,
            ctx.cancel,
            "conversations.rename",
            json!({"channel": self.id, "name": self.new_name}),
        )
        .with_context(|| {
            format!(
                "failed to rename channel {} ({}) to {}",
                self.old_name, self.id, self.new_name
            )
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveChannel {
    pub id: String,
    pub name: String,
}

impl ArchiveChannel {
    pub fn describe(&self) -> String {
        format!("Archive channel: {}", self.name)
    }

    pub fn apply(&self, ctx: &mut ApplyCtx) -> Result<()> {
        let _: Value = call_api(
            ctx.client,
            ctx.cancel,
            "conversations.archive",
            json!({"channel": self.id}),
        )
        .with_context(|| format!("failed to archive channel {} ({})", self.name, self.id))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnarchiveChannel {
    pub id: String,
    pub name: String,
}

impl UnarchiveChannel {
    pub fn describe(&self) -> String {
        format!("Unarchive channel: {}", self.name)
    }

    pub fn apply(&self, ctx: &mut ApplyCtx) -> Result<()> {
        let _: Value = call_api(
            ctx.client,
            ctx.cancel,
            "conversations.unarchive",
            json!({"channel": self.id}),
        )
        .with_context(|| format!("failed to unarchive channel {} ({})", self.id, self.name))?;
        Ok(())
    }
}
