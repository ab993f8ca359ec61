//! The frame pipeline: tick, infer, draw, recolor, repeat.
//!
//! One [`Scheduler`] owns the surface, the attached video stream and the debug flag. Its loop
//! suspends only while waiting for inference, and the next tick is awaited only after the
//! current cycle has finished drawing, so there is never more than one inference in flight.

use std::sync::mpsc;
use std::time::Instant;

use image::RgbaImage;
use tokio_util::sync::CancellationToken;

use crate::error::AcquisitionError;
use crate::face::Face;
use crate::landmarks::LandmarkSource;
use crate::overlay::draw_debug_overlay;
use crate::recolor::{recolor_eye, PixelBuffer};
use crate::region::{bounding_region, BoundingRegion};
use crate::state::{self, SharedState};
use crate::surface::{Surface, TextStyle};
use crate::ticker::Ticker;
use crate::timing::FrameTiming;
use crate::video::VideoSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// No stream attached.
    #[default]
    Idle,
    /// Stream attached, waiting for the next tick.
    Streaming,
    /// An inference request is outstanding.
    Annotating,
    /// Torn down. Terminal.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleDebug,
    SetDebug(bool),
    Stop,
}

/// Control side of a scheduler, usable from other threads.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    pub fn toggle_debug(&self) {
        let _ = self.commands.send(Command::ToggleDebug);
    }

    pub fn set_debug(&self, on: bool) {
        let _ = self.commands.send(Command::SetDebug(on));
    }

    /// Tears the pipeline down, abandoning an inference that is still running.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
        self.cancel.cancel();
    }
}

/// Receiving side of [`SchedulerHandle`], consumed by [`Scheduler::new`].
pub struct SchedulerControl {
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
}

pub fn control_channel() -> (SchedulerHandle, SchedulerControl) {
    let (sender, receiver) = mpsc::channel();
    let cancel = CancellationToken::new();
    (
        SchedulerHandle {
            commands: sender,
            cancel: cancel.clone(),
        },
        SchedulerControl {
            commands: receiver,
            cancel,
        },
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerOptions {
    pub text_style: TextStyle,
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Drawn { faces: usize },
    /// The stream has not produced a frame yet.
    NoFrame,
    /// Inference failed; nothing was drawn.
    Skipped,
    Cancelled,
}

/// Per-cycle configuration, fixed when the cycle starts.
struct CycleContext {
    index: u64,
    debug: bool,
    /// Child of the scheduler's token, fresh for every cycle.
    cancel: CancellationToken,
}

impl CycleContext {
    fn new(index: u64, debug: bool, root: &CancellationToken) -> Self {
        Self {
            index,
            debug,
            cancel: root.child_token(),
        }
    }
}

/// Reusable per-eye storage: slot 0 is the left iris, slot 1 the right.
#[derive(Default)]
struct EyeScratch {
    regions: [Option<BoundingRegion>; 2],
    buffers: [PixelBuffer; 2],
}

pub struct Scheduler<L, V, S, T> {
    source: L,
    video: Option<V>,
    surface: S,
    ticker: T,
    control: SchedulerControl,
    state: PipelineState,
    debug: bool,
    text_style: TextStyle,
    timing: FrameTiming,
    scratch: EyeScratch,
    cycles: u64,
    shared: Option<SharedState>,
}

impl<L, V, S, T> Scheduler<L, V, S, T>
where
    L: LandmarkSource,
    V: VideoSource,
    S: Surface,
    T: Ticker,
{
    pub fn new(
        source: L,
        surface: S,
        ticker: T,
        control: SchedulerControl,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            source,
            video: None,
            surface,
            ticker,
            control,
            state: PipelineState::Idle,
            debug: options.debug,
            text_style: options.text_style,
            timing: FrameTiming::new(Instant::now()),
            scratch: EyeScratch::default(),
            cycles: 0,
            shared: None,
        }
    }

    /// Publishes state, frame rate and failures to `shared`.
    pub fn with_shared(mut self, shared: SharedState) -> Self {
        self.shared = Some(shared);
        self.publish();
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    /// Number of completed draw cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Regions recolored most recently, per eye slot.
    pub fn last_regions(&self) -> [Option<BoundingRegion>; 2] {
        self.scratch.regions
    }

    /// Opens the video stream with `open` and attaches it.
    ///
    /// A failure is reported to the user once and leaves the scheduler idle for good.
    pub fn acquire<F>(&mut self, open: F) -> Result<(), AcquisitionError>
    where
        F: FnOnce() -> Result<V, AcquisitionError>,
    {
        if self.state != PipelineState::Idle {
            log::warn!("stream already acquired (state {:?})", self.state);
            return Ok(());
        }
        match open() {
            Ok(video) => {
                self.attach(video);
                Ok(())
            }
            Err(err) => {
                let message = format!("Failed to receive camera access: {err}");
                match &self.shared {
                    Some(shared) => state::notify(shared, message),
                    None => log::error!("{message}"),
                }
                Err(err)
            }
        }
    }

    /// Attaches an already playing stream and arms the loop.
    pub fn attach(&mut self, video: V) {
        let (w, h) = video.resolution();
        log::info!("stream attached ({w}x{h})");
        self.video = Some(video);
        if let Some(shared) = &self.shared {
            state::lock(shared).resolution = Some((w, h));
        }
        self.set_state(PipelineState::Streaming);
    }

    /// Runs cycles until stopped. Returns immediately when no stream is attached.
    pub async fn run(&mut self) {
        if self.state != PipelineState::Streaming {
            log::warn!("not starting the pipeline loop in state {:?}", self.state);
            return;
        }

        loop {
            self.drain_commands();
            if self.state == PipelineState::Stopped {
                break;
            }
            if self.control.cancel.is_cancelled() || self.ticker.wait().is_none() {
                self.stop();
                break;
            }
            if self.cycle().await == CycleOutcome::Cancelled {
                self.stop();
                break;
            }
        }
        log::info!("pipeline loop finished after {} cycles", self.cycles);
    }

    /// Runs a single capture, inference, draw cycle.
    pub async fn cycle(&mut self) -> CycleOutcome {
        let ctx = CycleContext::new(self.cycles, self.debug, &self.control.cancel);

        let Some(frame) = self.video.as_mut().and_then(|video| video.current_frame()) else {
            return CycleOutcome::NoFrame;
        };

        self.set_state(PipelineState::Annotating);
        let estimate = self.source.estimate(frame.clone());
        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => None,
            result = estimate => Some(result),
        };
        let faces = match result {
            Some(Ok(faces)) => faces,
            Some(Err(err)) => {
                log::warn!("cycle {}: inference failed, skipping frame: {err}", ctx.index);
                self.set_state(PipelineState::Streaming);
                return CycleOutcome::Skipped;
            }
            None => {
                log::debug!("cycle {}: inference abandoned", ctx.index);
                return CycleOutcome::Cancelled;
            }
        };

        self.draw(&ctx, &frame, &faces);
        self.timing.tick(Instant::now());
        self.cycles += 1;
        self.surface.present();
        self.set_state(PipelineState::Streaming);

        if let Some(shared) = &self.shared {
            let mut shared = state::lock(shared);
            shared.fps = Some(self.timing.fps());
            shared.mean_fps = self.timing.mean_fps();
            shared.face_count = faces.len();
            shared.cycles = self.cycles;
        }

        CycleOutcome::Drawn { faces: faces.len() }
    }

    fn draw(&mut self, ctx: &CycleContext, frame: &RgbaImage, faces: &[Face]) {
        self.surface.draw_frame(frame);

        let size = self.surface.size();
        for face in faces {
            for slot in 0..2 {
                let Some(group) = face.iris(slot).filter(|group| !group.is_empty()) else {
                    log::debug!("cycle {}: face without iris landmarks in slot {slot}", ctx.index);
                    self.scratch.regions[slot] = None;
                    continue;
                };

                let region = bounding_region(group, size);
                let buffer = &mut self.scratch.buffers[slot];
                self.surface.read_region(&region, buffer);
                recolor_eye(buffer);
                self.surface.write_region(buffer, region.min_x, region.min_y);
                self.scratch.regions[slot] = Some(region);
            }
        }

        if ctx.debug {
            draw_debug_overlay(&mut self.surface, faces, &self.timing.label(), self.text_style);
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.control.commands.try_recv() {
            match command {
                Command::ToggleDebug => self.debug = !self.debug,
                Command::SetDebug(on) => self.debug = on,
                Command::Stop => self.stop(),
            }
            log::debug!("{command:?} (debug {})", self.debug);
            self.publish();
        }
    }

    /// Detaches the stream and cancels the tick registration. No further cycles run.
    pub fn stop(&mut self) {
        if self.state == PipelineState::Stopped {
            return;
        }
        self.video = None;
        self.ticker.cancel();
        self.set_state(PipelineState::Stopped);
    }

    fn set_state(&mut self, next: PipelineState) {
        if self.state == next {
            return;
        }
        match (self.state, next) {
            (PipelineState::Streaming, PipelineState::Annotating)
            | (PipelineState::Annotating, PipelineState::Streaming) => {
                log::trace!("{:?} -> {next:?}", self.state)
            }
            _ => log::info!("pipeline {:?} -> {next:?}", self.state),
        }
        self.state = next;
        self.publish();
    }

    fn publish(&self) {
        if let Some(shared) = &self.shared {
            let mut shared = state::lock(shared);
            shared.pipeline = self.state;
            shared.debug = self.debug;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopping_cancels_the_running_cycle() {
        let (handle, control) = control_channel();
        let ctx = CycleContext::new(0, false, &control.cancel);
        assert!(!ctx.cancel.is_cancelled());

        handle.stop();
        assert!(ctx.cancel.is_cancelled());
        assert_eq!(control.commands.try_recv(), Ok(Command::Stop));
    }

    #[test]
    fn cycle_tokens_are_independent() {
        let (_handle, control) = control_channel();
        let first = CycleContext::new(0, false, &control.cancel);
        first.cancel.cancel();

        let second = CycleContext::new(1, true, &control.cancel);
        assert!(!second.cancel.is_cancelled());
        assert!(!control.cancel.is_cancelled());
        assert_eq!((second.index, second.debug), (1, true));
    }
}
