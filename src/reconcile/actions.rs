//! The closed set of reconcile actions.
//!
//! Each variant is an immutable value knowing how to describe itself for the
//! plan report and how to apply itself against the remote. Applies may mutate
//! the state caches so later actions in the same plan resolve correctly.

use anyhow::Result;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::reconcile::channel_state::ChannelState;
use crate::reconcile::channels::{ArchiveChannel, CreateChannel, RenameChannel, UnarchiveChannel};
use crate::reconcile::usergroup_state::UsergroupState;
use crate::reconcile::usergroups::{
    DeactivateUsergroup, ReactivateUsergroup, UpdateUsergroup, UpdateUsergroupMembers,
};
use crate::remote::RemoteClient;

/// Everything an action may touch while applying.
pub struct ApplyCtx<'a> {
    pub client: &'a dyn RemoteClient,
    pub config: &'a Config,
    pub channels: &'a mut ChannelState,
    pub groups: &'a mut UsergroupState,
    pub cancel: &'a CancelToken,
}

/// One step of a reconcile plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateChannel(CreateChannel),
    RenameChannel(RenameChannel),
    ArchiveChannel(ArchiveChannel),
    UnarchiveChannel(UnarchiveChannel),
    UpdateUsergroup(UpdateUsergroup),
    UpdateUsergroupMembers(UpdateUsergroupMembers),
    DeactivateUsergroup(DeactivateUsergroup),
    ReactivateUsergroup(ReactivateUsergroup),
}

impl Action {
    /// Single-line human description used in the plan report.
    pub fn describe(&self) -> String {
        match self {
            Action::CreateChannel(a) => a.describe(),
            Action::RenameChannel(a) => a.describe(),
            Action::ArchiveChannel(a) => a.describe(),
            Action::UnarchiveChannel(a) => a.describe(),
            Action::UpdateUsergroup(a) => a.describe(),
            Action::UpdateUsergroupMembers(a) => a.describe(),
            Action::DeactivateUsergroup(a) => a.describe(),
            Action::ReactivateUsergroup(a) => a.describe(),
        }
    }

    /// Apply the action against the remote, updating the caches.
    pub fn apply(&self, ctx: &mut ApplyCtx) -> Result<()> {
        match self {
            Action::CreateChannel(a) => a.apply(ctx),
            Action::RenameChannel(a) => a.apply(ctx),
            Action::ArchiveChannel(a) => a.apply(ctx),
            Action::UnarchiveChannel(a) => a.apply(ctx),
            Action::UpdateUsergroup(a) => a.apply(ctx),
            Action::UpdateUsergroupMembers(a) => a.apply(ctx),
            Action::DeactivateUsergroup(a) => a.apply(ctx),
            Action::ReactivateUsergroup(a) => a.apply(ctx),
        }
    }
}
