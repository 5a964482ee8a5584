//! Transformation kinds and compute devices.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::{InferenceError, Result};

/// Deformation model family a checkpoint was trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transformation {
    /// Dense per-voxel displacement field.
    Dense,
    /// B-spline parameterised field over a control-point grid.
    BSpline,
}

impl Transformation {
    pub fn as_str(self) -> &'static str {
        match self {
            Transformation::Dense => "dense",
            Transformation::BSpline => "bspline",
        }
    }
}

impl FromStr for Transformation {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dense" => Ok(Transformation::Dense),
            "bspline" | "b-spline" => Ok(Transformation::BSpline),
            other => Err(InferenceError::configuration(format!(
                "transformation must be dense or bspline, got {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    /// `gpu > 0` selects CUDA.
    pub fn from_gpu_count(gpu: u32) -> Self {
        if gpu > 0 {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transformation_parse_case_insensitive() {
        assert_eq!("Dense".parse::<Transformation>().unwrap(), Transformation::Dense);
        assert_eq!("bspline".parse::<Transformation>().unwrap(), Transformation::BSpline);
        assert_eq!("B-Spline".parse::<Transformation>().unwrap(), Transformation::BSpline);
    }

    #[test]
    fn test_transformation_rejects_affine() {
        let err = "affine".parse::<Transformation>().unwrap_err();
        assert!(matches!(err, InferenceError::Configuration(_)));
        assert!(err.to_string().contains("affine"));
    }

    #[test]
    fn test_device_from_gpu_count() {
        assert_eq!(Device::from_gpu_count(0), Device::Cpu);
        assert_eq!(Device::from_gpu_count(2), Device::Cuda);
        assert_eq!(Device::Cuda.to_string(), "cuda");
    }
}
