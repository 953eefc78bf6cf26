//! Domain layer - pure admission and targeting rules with no I/O.
//!
//! This layer contains the core concepts and invariants of the system:
//! - Send records and rolling-window counts
//! - Time-of-day sending policy
//! - Sender reputation scoring
//! - Contact history, lifecycle status and engagement scoring
//! - Admission/targeting decisions and schedule advice
//!
//! All types in this layer are pure and easily testable.

pub mod contact;
pub mod decision;
pub mod hours;
pub mod record;
pub mod reputation;
pub mod schedule;
