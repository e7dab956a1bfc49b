pub mod collector;
pub mod control;
pub mod details;
pub mod filter;
pub mod history;
pub mod owners;
pub mod platform;
pub mod process;
pub mod rate;
pub mod snapshot;
pub mod sort;
pub mod source;
