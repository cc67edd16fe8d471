//! Resource Adapter - 音效与背景音乐文件

mod sfx_resolver;

pub use sfx_resolver::{find_alternates, resolve_resource, FsAudioResources};
