//! dangerwatch - live danger-level presence shared in real time
//!
//! Participants publish their position and alert level; the server keeps
//! the latest record per identity and pushes the full set to every
//! connected channel after each change.

pub mod cli;
pub mod client;
pub mod http_server;
pub mod observability;
pub mod presence;
