//! Tagging Adapter - 容器元数据写入

mod lofty_tag_writer;

pub use lofty_tag_writer::{LoftyTagWriter, SYNCHRONIZED_LYRICS_TYPE};
