//! Bayes point machine math utilities.
//!
//! Gaussian beliefs in natural-parameter form, the truncated-Gaussian
//! moments used by ranking constraints, and log-domain helpers.

pub mod math;

pub use math::discrete::Discrete;
pub use math::error::BeliefError;
pub use math::gaussian::{Gaussian, GaussianMoments};
pub use math::normal::*;
pub use math::stable::*;
pub use math::vector_gaussian::{VectorGaussian, VectorMoments};
