//! device-link: command transport for the NPC controller board
//!
//! The controller firmware speaks a line protocol: one upper-case command per
//! line (`TALK\n`, `STOP\n`, ...). This crate provides the command vocabulary,
//! the blocking [`DeviceLink`] trait and feature-gated backends. The default
//! build enables a `mock` backend so that binaries run on any host without a
//! board attached.

mod command;
pub use command::DeviceCommand;

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::{DeviceLink, PortInfo};

mod null;
pub use null::NullLink;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockLink, SentLog};

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::{available_ports, find_device_port, SerialLink};
