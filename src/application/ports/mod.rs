//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_codec;
mod audio_resources;
mod loudness;
mod output_store;
mod speech_cache;
mod tag_writer;
mod tts_engine;

pub use audio_codec::{AudioCodecPort, AudioFormat, CodecError, EncodeConfig};
pub use audio_resources::{AudioResourcePort, ResourceError};
pub use loudness::{
    GainTags, LoudnessAnalyzerPort, LoudnessError, LoudnessMeasurement, LoudnessTarget,
    R128_REFERENCE_LUFS,
};
pub use output_store::{OutputError, OutputStorePort, StagingArea};
pub use speech_cache::{
    content_hash, CacheEntry, CacheError, CacheStats, SpeechCachePort, SweepResult,
};
pub use tag_writer::{BroadcastMetadata, TagError, TagOutcome, TagWriterPort};
pub use tts_engine::{SpeechProviderPort, SynthesisRequest, SynthesizedAudio, TtsError};
