//! Batch republishing pipeline.

mod publisher;
mod types;

pub use publisher::PublishPipeline;
pub use types::{BatchReport, BatchRequest};
