//! Test-only helpers shared across crate unit tests.
//!
//! Provides an in-memory transport, socket event recorders and a logger
//! that captures what the RPC layer reports.

pub mod events;
pub mod memory_transport;
pub mod recording_logger;
pub mod logtest_capture;
