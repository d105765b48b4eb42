//! Library crate for the workspace-messaging reconciler.
//!
//! `config` loads and merges layered YAML into a single desired-state
//! [`config::Config`]; `remote` talks to the messaging platform's HTTP API;
//! `reconcile` diffs desired against observed state and applies the plan.

pub mod cancel;
pub mod config;
pub mod logging;
pub mod reconcile;
pub mod remote;
pub mod test_support;
