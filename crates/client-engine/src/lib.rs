#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
// Dev-dependencies are only used by the integration tests.
#![cfg_attr(test, allow(unused_crate_dependencies))]

//! Run synchronization for `nlsub` (starting runs, polling progress, mirroring the registry).

/// Public API for the engine crate.
pub mod api;

mod backend;
mod controller;
mod error;
mod machine;
mod poller;
mod registry;

pub use api::{
    start_controller, start_controller_with, ControllerConfig, ControllerHandle, RunEvent,
    RunPhase, RunSnapshot, StartAccepted, StartRequest,
};
pub use backend::{HttpJobService, JobService, PolledSnapshot, RemoteStatus, StartAck};
pub use error::{ControlError, RegistryError, ServiceError, StartError};
pub use registry::RegistryMirror;
