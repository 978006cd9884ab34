#![no_std]

// Shared logic for the camera power controller.
//
// This crate stays portable across the Linux daemon and host tooling by
// avoiding the Rust standard library and exposing abstractions the other
// crates can adopt. Hardware access goes through the `embedded-hal` I2C
// trait; wall-clock time and the power-window schedule come in through
// collaborator traits on the orchestrator.

pub mod bus;
pub mod deadline;
pub mod error;
pub mod mcu;
pub mod orchestrator;
pub mod rtc;

#[cfg(test)]
pub(crate) mod testutil;
