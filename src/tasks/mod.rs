//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: removes expired L1 entries and their tag index links
//!   at configured intervals

mod sweep;

pub use sweep::spawn_sweep_task;
