//! Thin wrappers around host facilities that sit beside the snapshot engine:
//! the service manager and the desktop autostart directories.

pub mod services;
pub mod startup;
