pub mod app;
pub mod config;
pub mod error;
pub mod face;
pub mod landmarks;
pub mod overlay;
pub mod recolor;
pub mod region;
pub mod scheduler;
pub mod state;
pub mod surface;
pub mod ticker;
pub mod timing;
pub mod video;
pub mod webcam;

pub use error::{Error, Result};
