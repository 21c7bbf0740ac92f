//! Townfolk library crate: re-exports all modules for integration testing.
//!
//! The binary crate (`main.rs`) runs one simulated day headless.
//! This library crate exposes the same modules so that `tests/` integration
//! tests can import types, systems and resources without a window.

pub mod shared;
pub mod calendar;
pub mod world;
pub mod npcs;
pub mod data;
