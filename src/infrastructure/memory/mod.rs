//! Memory Layer - In-Memory State
//!
//! 合成缓存的内存实现

mod speech_cache;

pub use speech_cache::InMemorySpeechCache;
