//! Two-phase reconciliation: diff desired config against observed remote
//! state, then execute the resulting plan in order.
//!
//! Control flow is strictly sequential: fetch state, plan, report, apply.
//! Planning errors force dry-run; apply failures are logged and do not stop
//! the remaining actions.

pub mod actions;
pub mod channel_state;
pub mod channels;
pub mod usergroup_state;
pub mod usergroups;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

pub use self::actions::{Action, ApplyCtx};
pub use self::channel_state::ChannelState;
pub use self::usergroup_state::UsergroupState;

use self::channels::plan_channels;
use self::usergroups::plan_usergroups;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::remote::RemoteClient;

/// The ordered action list plus every error planning collected.
#[derive(Debug, Default)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub errors: Vec<anyhow::Error>,
}

/// Drives one reconcile of a single workspace.
pub struct Reconciler<'a> {
    client: &'a dyn RemoteClient,
    config: Config,
    channels: ChannelState,
    groups: UsergroupState,
    cancel: CancelToken,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a dyn RemoteClient, config: Config, cancel: CancelToken) -> Self {
        Self {
            client,
            config,
            channels: ChannelState::new(),
            groups: UsergroupState::new(),
            cancel,
        }
    }

    /// Fetch remote state, plan, and execute (or print) the plan.
    ///
    /// Returns an error if planning produced any errors, even when every
    /// action applied cleanly.
    pub fn reconcile(&mut self, dry_run: bool) -> Result<()> {
        self.channels
            .init(self.client, &self.cancel)
            .context("failed to get initial channel state")?;
        self.groups
            .init(self.client, &self.cancel)
            .context("failed to get initial usergroup state")?;
        let plan = self.plan();
        self.execute(plan, dry_run)
    }

    /// Channel actions first, then user groups: group updates reference
    /// channel ids that may be created earlier in the same run.
    pub fn plan(&mut self) -> Plan {
        let (mut actions, mut errors) = plan_channels(&self.config, &mut self.channels);
        let (group_actions, group_errors) =
            plan_usergroups(&self.config, &self.channels, &self.groups);
        actions.extend(group_actions);
        errors.extend(group_errors);
        info!(
            actions = actions.len(),
            errors = errors.len(),
            "planning complete"
        );
        Plan { actions, errors }
    }

    /// Execute a plan in order, best-effort, honoring dry-run.
    pub fn execute(&mut self, plan: Plan, dry_run: bool) -> Result<()> {
        let failed = !plan.errors.is_empty();
        let mut dry_run = dry_run;

        if failed {
            println!("This configuration cannot be applied against the current state:");
            for (i, e) in plan.errors.iter().enumerate() {
                println!("Error {}: {e:#}.", i + 1);
            }
        }

        if !dry_run && failed {
            dry_run = true;
            println!("Not executing anything due to errors, but this is what would have been done:");
        } else if dry_run {
            println!("In dry-run mode so taking no action, but this is what would have been done:");
        }

        if plan.actions.is_empty() {
            println!("Nothing to do.");
        }
        for (i, action) in plan.actions.iter().enumerate() {
            if self.cancel.is_cancelled() {
                bail!("reconcile cancelled after {i} actions");
            }
            println!("Step {}: {}.", i + 1, action.describe());
            if dry_run {
                continue;
            }
            let mut ctx = ApplyCtx {
                client: self.client,
                config: &self.config,
                channels: &mut self.channels,
                groups: &mut self.groups,
                cancel: &self.cancel,
            };
            if let Err(err) = action.apply(&mut ctx) {
                warn!(step = i + 1, "action failed");
                println!("Failed: {err:#}.");
            }
        }

        if failed {
            bail!("there were configuration errors");
        }
        Ok(())
    }

    pub fn channels(&self) -> &ChannelState {
        &self.channels
    }

    pub fn groups(&self) -> &UsergroupState {
        &self.groups
    }
}
