// src/build/mod.rs
pub mod build_pipeline;
pub mod checkpoint;

pub use build_pipeline::{build_database, index_reference_file, TaskOutcome};
