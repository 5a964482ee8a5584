//! vxm-registrar - registration models backed by an external process
//!
//! Provides a [`ModelLoader`](vxm_core::ModelLoader) that:
//! - Resolves `dense` / `bspline` to a named network and checkpoint
//! - Runs one registration process per subject, optionally with a timeout
//! - Reads the subject's metrics back from the process output

pub mod model;
pub mod runner;

// Re-export key types
pub use model::{network_name, ProcessModel, ProcessModelLoader};
pub use runner::{execute, ProcessOutput};
