//! Bayes point machine common types and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Dense and sparse feature items with validation
//! - Labeled batches and chunk partitioning
//! - The unified error taxonomy with stable codes

pub mod error;
pub mod item;

pub use error::{format_error_human, DimensionError, Error, ErrorCategory, Result, StructuredError};
pub use item::{Batch, Chunk, FeatureView, Item, LabeledItem, SparseItem};
