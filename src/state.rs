use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;

use crate::scheduler::PipelineState;

// make SharedState an alias for a Mutex protected struct State
pub type SharedState = Arc<Mutex<State>>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelStatus {
    #[default]
    Loading,
    Loaded,
    Failed(String),
}

/// What the pipeline thread publishes for the GUI.
#[derive(Default)]
pub struct State {
    pub pipeline: PipelineState,
    pub model: ModelStatus,
    pub fps: Option<f32>,
    pub mean_fps: Option<f32>,
    pub face_count: usize,
    pub debug: bool,
    pub resolution: Option<(u32, u32)>,
    pub image: Option<RgbaImage>,
    pub cycles: u64,
    // user-visible failure messages, shown until the app exits
    pub notices: Vec<String>,
}

pub fn new_shared() -> SharedState {
    Arc::new(Mutex::new(State::default()))
}

/// Locks the shared state. A panic on another thread does not make the snapshot unusable.
pub fn lock(shared: &SharedState) -> MutexGuard<'_, State> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reports a failure to the user.
pub fn notify(shared: &SharedState, message: impl Into<String>) {
    let message = message.into();
    log::error!("{message}");
    lock(shared).notices.push(message);
}
