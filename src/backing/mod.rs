//! Backing Module
//!
//! Decorators that connect a cache to an authoritative data source.

mod read_through;
mod singleflight;
mod source;
mod write_through;

pub use read_through::ReadThroughCache;
pub use singleflight::{SingleflightGroup, SingleflightReadThroughCache};
pub use source::{BackingStore, Loader};
pub use write_through::WriteThroughCache;
