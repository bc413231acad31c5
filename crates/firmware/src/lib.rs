//! Motion control firmware for the sable drawing table.
//!
//! The firmware is a single-threaded cooperative control loop: read at most
//! one serial line per pass, act on it, reply. Batch execution and homing
//! block the loop, so the protocol is strictly half duplex and the
//! ready-marker is the host's only synchronization point.
//!
//! Hardware lives behind three small traits ([`stepper::Device`],
//! [`stepper::SystemClock`], [`stepper::Endstop`]) and one for the serial
//! channel ([`link::Link`]), so the whole controller runs unchanged against
//! real step pins, a HAL, or the in-memory fakes the tests use.

pub mod controller;
pub mod link;
pub mod stepper;

pub use controller::{Controller, State};
pub use link::Link;
pub use stepper::{Axis, Device, Endstop, OperatingSystemClock, SystemClock};
