//! Shared, I/O-free building blocks for the `nlsub` client.

pub mod emails;
pub mod newsletter;
pub mod settings;
pub mod summary;
pub mod task;
