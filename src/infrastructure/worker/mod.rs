//! Worker Layer - Background Tasks

mod cache_sweeper;

pub use cache_sweeper::{CacheSweeper, CacheSweeperConfig};
