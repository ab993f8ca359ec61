use std::sync::Arc;

use image::RgbaImage;

/// A captured video frame. Cheap to clone, so the same frame can go to the inference worker
/// and to the surface.
pub type Frame = Arc<RgbaImage>;

/// A live, playing video stream.
pub trait VideoSource {
    fn resolution(&self) -> (u32, u32);

    /// The frame currently shown by the stream, or `None` before the first one has arrived.
    fn current_frame(&mut self) -> Option<Frame>;
}

impl<V: VideoSource + ?Sized> VideoSource for Box<V> {
    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }

    fn current_frame(&mut self) -> Option<Frame> {
        (**self).current_frame()
    }
}
