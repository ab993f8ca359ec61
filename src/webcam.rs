// thin wrapper around openpnp_capture
use std::ffi::CStr;
use std::sync::Arc;

use image::RgbaImage;
use openpnp_capture_sys as openpnp_sys;
use openpnp_sys::{CapContext, CapFormatInfo, CapStream};
use rayon::prelude::*;

use crate::error::AcquisitionError;
use crate::video::{Frame, VideoSource};

/// Expands packed RGB24 into RGBA with an opaque alpha channel.
pub fn rgb24_to_rgba(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len() / 3, dst.len() / 4);

    src.par_chunks_exact(3)
        .zip(dst.par_chunks_exact_mut(4))
        .for_each(|(rgb, rgba)| {
            rgba[..3].copy_from_slice(rgb);
            rgba[3] = 255;
        });
}

struct Context(CapContext);

impl Context {
    fn new() -> Result<Self, AcquisitionError> {
        let ctx = unsafe { openpnp_sys::Cap_createContext() };
        if ctx.is_null() {
            return Err(AcquisitionError::Context);
        }
        Ok(Self(ctx))
    }

    fn device_count(&self) -> u32 {
        unsafe { openpnp_sys::Cap_getDeviceCount(self.0) }
    }

    fn device_name(&self, device: u32) -> String {
        let name = unsafe { openpnp_sys::Cap_getDeviceName(self.0, device) };
        if name.is_null() {
            return format!("camera {device}");
        }
        unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
    }

    fn formats(&self, device: u32) -> Vec<(u32, CapFormatInfo)> {
        let count = unsafe { openpnp_sys::Cap_getNumFormats(self.0, device) };
        (0..count.max(0) as u32)
            .filter_map(|id| {
                let mut info: CapFormatInfo = unsafe { std::mem::zeroed() };
                let res = unsafe { openpnp_sys::Cap_getFormatInfo(self.0, device, id, &mut info) };
                (res == openpnp_sys::CAPRESULT_OK).then_some((id, info))
            })
            .collect()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe { openpnp_sys::Cap_releaseContext(self.0) };
    }
}

/// Names of the cameras currently attached.
pub fn list_devices() -> Result<Vec<String>, AcquisitionError> {
    let ctx = Context::new()?;
    Ok((0..ctx.device_count()).map(|i| ctx.device_name(i)).collect())
}

/// A live camera stream at a fixed resolution.
pub struct Webcam {
    stream: CapStream,
    ctx: Context,
    name: String,
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    current: Option<Frame>,
}

impl Webcam {
    /// Opens `device` with a format of exactly `width` x `height`, preferring the highest
    /// frame rate among matching formats.
    pub fn open(device: u32, width: u32, height: u32) -> Result<Self, AcquisitionError> {
        let ctx = Context::new()?;

        let available = ctx.device_count();
        if available == 0 {
            return Err(AcquisitionError::NoDevice);
        }
        if device >= available {
            return Err(AcquisitionError::UnknownDevice { device, available });
        }

        let name = ctx.device_name(device);
        let (format_id, info) = ctx
            .formats(device)
            .into_iter()
            .filter(|(_, info)| info.width == width && info.height == height)
            .max_by_key(|(_, info)| info.fps)
            .ok_or(AcquisitionError::UnsupportedResolution {
                device,
                width,
                height,
            })?;

        log::info!(
            "opening {name} with format {format_id} ({}x{} @ {} fps)",
            info.width,
            info.height,
            info.fps
        );

        let stream = unsafe { openpnp_sys::Cap_openStream(ctx.0, device, format_id) };
        if stream < 0 {
            return Err(AcquisitionError::OpenFailed(device));
        }

        Ok(Self {
            stream,
            ctx,
            name,
            width,
            height,
            rgb: vec![0; width as usize * height as usize * 3],
            current: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn capture(&mut self) -> Option<Frame> {
        let res = unsafe {
            openpnp_sys::Cap_captureFrame(
                self.ctx.0,
                self.stream,
                self.rgb.as_mut_ptr().cast(),
                self.rgb.len() as u32,
            )
        };
        if res != openpnp_sys::CAPRESULT_OK {
            log::warn!("capturing a frame from {} failed ({res})", self.name);
            return None;
        }

        let mut image = RgbaImage::new(self.width, self.height);
        rgb24_to_rgba(&self.rgb, &mut image);
        Some(Arc::new(image))
    }
}

impl VideoSource for Webcam {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn current_frame(&mut self) -> Option<Frame> {
        let fresh = unsafe { openpnp_sys::Cap_hasNewFrame(self.ctx.0, self.stream) } != 0;
        if fresh {
            if let Some(frame) = self.capture() {
                self.current = Some(frame);
            }
        }
        self.current.clone()
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        log::info!("closing camera stream ({})", self.name);
        unsafe { openpnp_sys::Cap_closeStream(self.ctx.0, self.stream) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_is_padded_with_opaque_alpha() {
        let src = [1, 2, 3, 4, 5, 6];
        let mut dst = [0u8; 8];
        rgb24_to_rgba(&src, &mut dst);
        assert_eq!(dst, [1, 2, 3, 255, 4, 5, 6, 255]);
    }
}
