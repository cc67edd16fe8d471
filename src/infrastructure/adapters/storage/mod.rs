//! Output Storage Adapter

mod staged_output;

pub use staged_output::{expand_file_template, StagedOutputStore};
