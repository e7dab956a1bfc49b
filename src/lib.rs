pub mod action;
pub mod bridge;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod report;
pub mod sampler;
pub mod system;
