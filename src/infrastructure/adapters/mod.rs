//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod codec;
pub mod loudness;
pub mod resources;
pub mod storage;
pub mod tagging;
pub mod tts;

pub use codec::*;
pub use loudness::*;
pub use resources::*;
pub use storage::*;
pub use tagging::*;
pub use tts::*;
