//! Background Tasks Module
//!
//! Contains background tasks owned by cache instances.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries from a base store at a fixed interval

mod sweeper;

pub(crate) use sweeper::{spawn_sweep_task, SweepHandle};
