//! Role name constants used for access-control checks.
//!
//! Roles are issued by the surrounding auth system; this subsystem only
//! needs to distinguish platform admins (who may see every tenant's jobs)
//! from everyone else.

/// Platform administrator: may view, cancel, and list any job.
pub const ROLE_ADMIN: &str = "admin";
