pub mod mediapipe;

use std::future::Future;
use std::sync::mpsc;
use std::thread;

use image::RgbaImage;
use tokio::sync::oneshot;

use crate::error::{InferenceError, ModelLoadError};
use crate::face::Face;
use crate::video::Frame;

/// Asynchronous face landmark estimation: one frame in, zero or more faces out.
pub trait LandmarkSource {
    fn estimate(&self, frame: Frame) -> impl Future<Output = Result<Vec<Face>, InferenceError>>;
}

/// A landmark model that runs synchronously on the calling thread.
pub trait FaceLandmarksModel {
    fn run(&mut self, image: &RgbaImage) -> Result<Vec<Face>, InferenceError>;
}

type Reply = oneshot::Sender<Result<Vec<Face>, InferenceError>>;

enum Job {
    Estimate(Frame, Reply),
    Terminate,
}

/// Runs a blocking [`FaceLandmarksModel`] on its own worker thread and hands out results as
/// futures, so waiting on inference never blocks the pipeline thread's other work.
pub struct ThreadedLandmarkSource {
    sender: mpsc::Sender<Job>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ThreadedLandmarkSource {
    /// Spawns the worker and builds the model on it. Returns once the model is ready, or
    /// with the error that prevented loading it.
    pub fn spawn<M, F>(name: &str, build: F) -> Result<Self, ModelLoadError>
    where
        M: FaceLandmarksModel,
        F: FnOnce() -> Result<M, ModelLoadError> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<Job>();
        let (ready_sender, ready_receiver) = mpsc::sync_channel(1);

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut model = match build() {
                    Ok(model) => {
                        let _ = ready_sender.send(Ok(()));
                        model
                    }
                    Err(err) => {
                        let _ = ready_sender.send(Err(err));
                        return;
                    }
                };

                while let Ok(job) = receiver.recv() {
                    match job {
                        Job::Estimate(frame, reply) => {
                            // the receiver is gone when the cycle was abandoned
                            let _ = reply.send(model.run(&frame));
                        }
                        Job::Terminate => break,
                    }
                }
                log::debug!("inference worker exiting");
            })
            .map_err(ModelLoadError::Spawn)?;

        match ready_receiver.recv() {
            Ok(Ok(())) => Ok(Self {
                sender,
                thread: Some(thread),
            }),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(ModelLoadError::WorkerExited)
            }
        }
    }
}

impl LandmarkSource for ThreadedLandmarkSource {
    fn estimate(&self, frame: Frame) -> impl Future<Output = Result<Vec<Face>, InferenceError>> {
        let (reply, pending) = oneshot::channel();
        let sent = self
            .sender
            .send(Job::Estimate(frame, reply))
            .map_err(|_| InferenceError::WorkerGone);
        async move {
            sent?;
            pending.await.unwrap_or(Err(InferenceError::WorkerGone))
        }
    }
}

impl Drop for ThreadedLandmarkSource {
    fn drop(&mut self) {
        let _ = self.sender.send(Job::Terminate);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("inference worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{FaceBox, Point2};
    use std::sync::Arc;

    struct CountingModel {
        calls: usize,
    }

    impl FaceLandmarksModel for CountingModel {
        fn run(&mut self, image: &RgbaImage) -> Result<Vec<Face>, InferenceError> {
            self.calls += 1;
            let (w, h) = image.dimensions();
            let face = Face::new(
                FaceBox {
                    top_left: Point2::new(0.0, 0.0),
                    bottom_right: Point2::new(w as f32, h as f32),
                },
                1.0,
            );
            Ok(vec![face; self.calls])
        }
    }

    #[test]
    fn results_come_back_in_request_order() {
        let source = ThreadedLandmarkSource::spawn("test-inference", || {
            Ok(CountingModel { calls: 0 })
        })
        .unwrap();
        let frame: Frame = Arc::new(RgbaImage::new(8, 4));

        let first = pollster::block_on(source.estimate(frame.clone())).unwrap();
        let second = pollster::block_on(source.estimate(frame)).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].bounding_box.width(), 8.0);
    }

    #[test]
    fn abandoned_requests_do_not_stop_the_worker() {
        let source = ThreadedLandmarkSource::spawn("test-inference", || {
            Ok(CountingModel { calls: 0 })
        })
        .unwrap();
        let frame: Frame = Arc::new(RgbaImage::new(8, 4));

        drop(source.estimate(frame.clone()));
        let faces = pollster::block_on(source.estimate(frame)).unwrap();
        assert_eq!(faces.len(), 2);
    }

    #[test]
    fn load_failures_surface_from_spawn() {
        let result = ThreadedLandmarkSource::spawn("test-inference", || {
            Err::<CountingModel, _>(ModelLoadError::NotFound("missing.onnx".into()))
        });
        assert!(matches!(result, Err(ModelLoadError::NotFound(_))));
    }
}
