//! Core math modules.

pub mod discrete;
pub mod error;
pub mod gaussian;
pub mod normal;
pub mod stable;
pub mod vector_gaussian;
