//! Suite housekeeping
//!
//! Resolves retention settings into cycles, then deletes the items of those
//! cycles on job hosts and in the local suite directory.

pub mod archive;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod executor;
pub mod fs_util;
pub mod remote;
pub mod resolver;
pub mod shift;
