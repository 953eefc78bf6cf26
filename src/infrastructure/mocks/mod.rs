//! Mock implementations for testing.
//!
//! [`MockCaptureLayer`] records emitted `tracing` events so tests can assert
//! on warnings and their structured fields. Deterministic time is provided
//! by [`ManualClock`](crate::ManualClock), which is always available.

pub mod layer;

pub use layer::{CapturedEvent, MockCaptureLayer};
