//! User-group diffing and the group-side actions.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::reconcile::actions::{Action, ApplyCtx};
use crate::reconcile::channel_state::ChannelState;
use crate::reconcile::usergroup_state::UsergroupState;
use crate::remote::call_api;
use crate::remote::types::Subteam;

/// Diff configured user groups against the observed state.
///
/// Presence in config keeps a group alive; remote groups the config never
/// mentions are deactivated (soft delete), and groups already deactivated are
/// left alone. External groups are recorded but never touched. Runs after
/// channel planning so channel references resolve against the post-rename,
/// post-create cache.
pub fn plan_usergroups(
    config: &Config,
    channels: &ChannelState,
    groups: &UsergroupState,
) -> (Vec<Action>, Vec<anyhow::Error>) {
    let mut missing: BTreeMap<String, (String, u64)> = groups
        .iter()
        .map(|g| (g.handle.clone(), (g.id.clone(), g.delete_time)))
        .collect();

    let mut actions = Vec::new();
    let mut errors = Vec::new();

    for g in &config.usergroups {
        missing.remove(&g.name);
        if let Some(remote) = groups.get_by_handle(&g.name) {
            if g.external {
                continue;
            }
            if g.long_name.is_empty()
                || g.name.is_empty()
                || g.description.is_empty()
                || g.members.is_empty()
            {
                errors.push(anyhow!(
                    "usergroup configuration for {:?} is bad: all usergroups must have a name, long name, description, and at least one member",
                    g.name
                ));
                continue;
            }

            // A soft-deleted group mentioned in config needs undeleting.
            if remote.delete_time > 0 {
                actions.push(Action::ReactivateUsergroup(ReactivateUsergroup {
                    id: remote.id.clone(),
                    handle: remote.handle.clone(),
                }));
            }

            let mut target_users = match config.names_to_ids(&g.members) {
                Ok(ids) => ids,
                Err(err) => {
                    errors.push(anyhow!("{}: {err}", remote.name));
                    continue;
                }
            };
            target_users.sort();
            let mut remote_users = remote.users.clone();
            remote_users.sort();

            let mut target_channels = match channels.names_to_ids(&g.channels) {
                Ok(ids) => ids,
                Err(err) => {
                    errors.push(anyhow!("{}: {err}", remote.name));
                    continue;
                }
            };
            target_channels.sort();
            let mut remote_channels = remote.prefs.channels.clone();
            remote_channels.sort();

            let needs_update = remote.name != g.long_name
                || remote.description != g.description
                || target_channels != remote_channels;

            if needs_update {
                actions.push(Action::UpdateUsergroup(UpdateUsergroup {
                    id: remote.id.clone(),
                    handle: g.name.clone(),
                    name: g.long_name.clone(),
                    description: g.description.clone(),
                    channel_names: g.channels.clone(),
                    create: false,
                }));
            }
            if remote_users != target_users {
                actions.push(Action::UpdateUsergroupMembers(UpdateUsergroupMembers {
                    id: remote.id.clone(),
                    name: remote.handle.clone(),
                    users: target_users,
                }));
            }
        } else {
            if g.external {
                continue;
            }
            let target_users = match config.names_to_ids(&g.members) {
                Ok(ids) => ids,
                Err(err) => {
                    errors.push(anyhow!("{}: {err}", g.name));
                    continue;
                }
            };
            // The members action resolves the new group's id from the cache
            // after the create lands; the pair must stay adjacent.
            actions.push(Action::UpdateUsergroup(UpdateUsergroup {
                id: String::new(),
                handle: g.name.clone(),
                name: g.long_name.clone(),
                description: g.description.clone(),
                channel_names: g.channels.clone(),
                create: true,
            }));
            actions.push(Action::UpdateUsergroupMembers(UpdateUsergroupMembers {
                id: String::new(),
                name: g.name.clone(),
                users: target_users,
            }));
        }
    }

    for (handle, (id, delete_time)) in missing {
        if delete_time == 0 {
            actions.push(Action::DeactivateUsergroup(DeactivateUsergroup {
                id,
                handle,
            }));
        }
    }

    (actions, errors)
}

fn join_ids(ids: &[String]) -> String {
    ids.join(",")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateUsergroup {
    /// Empty when `create` is set; the remote assigns the id.
    pub id: String,
    pub handle: String,
    pub name: String,
    pub description: String,
    pub channel_names: Vec<String>,
    pub create: bool,
}

impl UpdateUsergroup {
    pub fn describe(&self) -> String {
        let verb = if self.create { "Create" } else { "Update" };
        format!(
            "{} usergroup {} ({}): name = {:?}, description = {:?}, channels = {:?}",
            verb, self.handle, self.id, self.name, self.description, self.channel_names
        )
    }

    pub fn apply(&self, ctx: &mut ApplyCtx) -> Result<()> {
        let channel_ids = ctx
            .channels
            .names_to_ids(&self.channel_names)
            .with_context(|| format!("couldn't find channel IDs for usergroup {}", self.name))?;
        if channel_ids.iter().any(String::is_empty) {
            bail!(
                "unexpected empty channel ID when updating usergroup {}",
                self.name
            );
        }

        let mut payload = json!({
            "channels": join_ids(&channel_ids),
            "description": self.description,
            "name": self.name,
            "handle": self.handle,
        });
        let method = if self.create {
            "usergroups.create"
        } else {
            payload["usergroup"] = json!(self.id);
            "usergroups.update"
        };

        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct Updated {
            usergroup: Subteam,
        }
        let updated: Updated = call_api(ctx.client, ctx.cancel, method, payload)
            .with_context(|| format!("failed to update usergroup {} ({})", self.name, self.id))?;
        if self.create {
            ctx.groups.insert(updated.usergroup);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateUsergroupMembers {
    /// Either `id` or `name` must be set; an id resolved at plan time wins.
    pub id: String,
    pub name: String,
    pub users: Vec<String>,
}

impl UpdateUsergroupMembers {
    pub fn describe(&self) -> String {
        format!(
            "Set members of usergroup {} ({}) to {:?}",
            self.name, self.id, self.users
        )
    }

    pub fn apply(&self, ctx: &mut ApplyCtx) -> Result<()> {
        let id = if self.id.is_empty() {
            if self.name.is_empty() {
                bail!("internal error: at least one of name and id must be specified when updating members");
            }
            match ctx.groups.get_by_handle(&self.name) {
                Some(group) => group.id.clone(),
                None => bail!("couldn't find the ID for the group {:?}", self.name),
            }
        } else {
            self.id.clone()
        };
        let _: Value = call_api(
            ctx.client,
            ctx.cancel,
            "usergroups.users.update",
            json!({"usergroup": id, "users": join_ids(&self.users)}),
        )
        .with_context(|| format!("failed to update members of usergroup {id}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeactivateUsergroup {
    pub id: String,
    pub handle: String,
}

impl DeactivateUsergroup {
    pub fn describe(&self) -> String {
        format!("Deactivate usergroup {} ({})", self.handle, self.id)
    }

    pub fn apply(&self, ctx: &mut ApplyCtx) -> Result<()> {
        let _: Value = call_api(
            ctx.client,
            ctx.cancel,
            "usergroups.disable",
            json!({"usergroup": self.id}),
        )
        .with_context(|| format!("failed to disable usergroup {} ({})", self.handle, self.id))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactivateUsergroup {
    pub id: String,
    pub handle: String,
}

impl ReactivateUsergroup {
    pub fn describe(&self) -> String {
        format!("Reactivate usergroup: {}", self.handle)
    }

    pub fn apply(&self, ctx: &mut ApplyCtx) -> Result<()> {
        let _: Value = call_api(
            ctx.client,
            ctx.cancel,
            "usergroups.enable",
            json!({"usergroup": self.id}),
        )
        .with_context(|| {
            format!("failed to reactivate usergroup {} ({})", self.handle, self.id)
        })?;
        Ok(())
    }
}
