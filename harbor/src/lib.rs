//! Harbormaster Library
//!
//! Deploys an app as a replicated Docker Swarm service and follows the
//! swarm's rolling update until it succeeds, pauses or rolls back.

pub mod cluster;
pub mod config;
pub mod deploy;
pub mod docker;
pub mod errors;
pub mod filesys;
pub mod images;
pub mod logs;
pub mod proxy;
pub mod utils;
