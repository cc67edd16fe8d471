//! Codec Adapter - PCM 编解码实现

mod symphonia_codec;

pub use symphonia_codec::{encode_opus, encode_wav, SymphoniaCodec};
