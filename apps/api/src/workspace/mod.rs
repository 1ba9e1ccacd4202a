// Workspaces and their members. The access check reads memberships from here;
// privacy settings are written through `WorkspaceStore::update_privacy`.

pub mod collaboration;
pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod store;
