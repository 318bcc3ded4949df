//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries from every domain store

mod cleanup;

pub use cleanup::spawn_sweep_task;
