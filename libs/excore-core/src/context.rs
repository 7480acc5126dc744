//! A thin "current context" convenience for the CLI.
//!
//! Spec §5/§9: parse/build take an explicit context by reference; this
//! module exists only so `excore-cli` doesn't have to thread a
//! `RegistryPool`/`WorkspaceContext` pair through every subcommand by
//! hand. Library embedders should prefer the explicit APIs in
//! [`crate::config_dict`] and [`crate::lazy_config`].

use once_cell::sync::OnceCell;

use crate::config_dict::WorkspaceContext;

static CURRENT_WORKSPACE: OnceCell<WorkspaceContext> = OnceCell::new();

/// Install the process-wide workspace context. Call once at start-up;
/// subsequent calls are ignored (first writer wins, matching the
/// workspace descriptor's "read once at start-up" lifecycle from spec §5).
pub fn set_current_workspace(ctx: WorkspaceContext) {
    let _ = CURRENT_WORKSPACE.set(ctx);
}

pub fn current_workspace() -> Option<&'static WorkspaceContext> {
    CURRENT_WORKSPACE.get()
}
