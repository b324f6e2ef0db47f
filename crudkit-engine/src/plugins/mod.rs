//! Built-in plugins. When enabled, permissions run first, then audit, then
//! user plugins.

pub mod audit;
pub mod permissions;
