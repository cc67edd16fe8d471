//! Sled 存储

mod speech_cache;

pub use speech_cache::{SledCacheConfig, SledSpeechCache};
