use std::path::PathBuf;

use thiserror::Error;

/// The camera stream could not be set up. Terminal for the session.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no camera device found")]
    NoDevice,
    #[error("camera device {device} does not exist ({available} available)")]
    UnknownDevice { device: u32, available: u32 },
    #[error("camera device {device} does not offer a {width}x{height} format")]
    UnsupportedResolution { device: u32, width: u32, height: u32 },
    #[error("failed to open camera stream on device {0}")]
    OpenFailed(u32),
    #[error("failed to create capture context")]
    Context,
}

/// The inference backend failed to initialize. The pipeline never starts.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model file {} not found", .0.display())]
    NotFound(PathBuf),
    #[error("onnx runtime error: {0}")]
    Ort(#[from] ort::OrtError),
    #[error("failed to spawn inference worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("inference worker exited before reporting readiness")]
    WorkerExited,
}

/// A single inference call failed. The scheduler skips the cycle.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("onnx runtime error: {0}")]
    Ort(#[from] ort::OrtError),
    #[error("unexpected tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("model produced {got} values, expected {expected}")]
    OutputSize { got: usize, expected: usize },
    #[error("inference worker is gone")]
    WorkerGone,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
