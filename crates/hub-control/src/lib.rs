//! Hub-side control of a printer fleet.
//!
//! This crate drives the client half of the device protocol on top of any
//! [`Transport`](printlink_transport::Transport):
//!
//! - [`UploadSession`] sends one file as ordered chunks plus a commit and
//!   waits for the controller's verdict.
//! - [`DeviceCommands`] sends print/pause/resume/cancel and waits for each
//!   `command_result`.
//! - [`FleetClient`] is the composition root owning the result correlator,
//!   its timeout scanner and the status fan-in.
//! - [`GcodeLibrary`] stores G-code files and sends them to printers.

pub mod commands;
pub mod error;
pub mod fleet;
pub mod session;
pub mod types;
pub mod workflow;

#[cfg(test)]
pub(crate) mod sim;

pub use commands::DeviceCommands;
pub use error::ControlError;
pub use fleet::FleetClient;
pub use session::UploadSession;
pub use types::{
    CommandOutcome, CommandReport, EventCallback, FleetOptions, UploadEvent, UploadOptions,
    UploadOutcome, UploadReport, UploadRequest,
};
pub use workflow::{GcodeLibrary, PrintJobReport};
