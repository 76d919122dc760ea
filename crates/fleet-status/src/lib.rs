//! Fleet status fan-in.
//!
//! Controllers publish periodic heartbeats on their status topics. The
//! [`StatusFanIn`] owned by the composition root consolidates them into one
//! `deviceId -> DeviceStatusSnapshot` map and derives aggregate counts.
//! Everyone else reads through a cloneable [`StatusView`].

mod fanin;
mod types;
mod view;

pub use fanin::StatusFanIn;
pub use types::{DeviceStatusSnapshot, FleetSummary};
pub use view::StatusView;
