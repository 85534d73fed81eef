//! API models

pub mod container;
pub mod events;
pub mod exec;
pub mod image;
pub mod network;
pub mod prune;
pub mod secret;
pub mod service;
pub mod system;
pub mod task;
