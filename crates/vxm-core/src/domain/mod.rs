//! Domain models for vxm-infer.
//!
//! Canonical definitions for the core entities:
//! - `Round`: position in the three-round refinement sequence
//! - `Transformation` / `Device`: model family and compute target
//! - `SubjectOutcome`: per-subject error metrics before and after registration

pub mod error;
pub mod round;
pub mod subject;
pub mod transform;

// Re-export main types and errors
pub use error::{InferenceError, Result};
pub use round::Round;
pub use subject::{subject_stem, SubjectOutcome, SubjectRecord};
pub use transform::{Device, Transformation};
