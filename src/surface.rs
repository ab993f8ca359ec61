use std::path::Path;

use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};

use crate::error::{Error, Result};
use crate::recolor::PixelBuffer;
use crate::region::BoundingRegion;
use crate::state::{self, SharedState};

/// Font size and fill color used by [`Surface::draw_text`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub color: Rgba<u8>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 18.0,
            color: Rgba([0xcb, 0x9e, 0xff, 0xff]),
        }
    }
}

/// The drawing target the pipeline composites onto.
///
/// All coordinates are in the surface's own pixel space. Reading outside the surface yields
/// transparent black, writing outside of it is clipped.
pub trait Surface {
    fn size(&self) -> (u32, u32);

    /// Draws a whole video frame, stretched to cover the surface.
    fn draw_frame(&mut self, frame: &RgbaImage);

    /// Copies `region` into `buffer`, reshaping the buffer to the region's size.
    fn read_region(&self, region: &BoundingRegion, buffer: &mut PixelBuffer);

    /// Copies `buffer` back with its top-left corner at `(x, y)`.
    fn write_region(&mut self, buffer: &PixelBuffer, x: i32, y: i32);

    fn set_text_style(&mut self, style: TextStyle);

    /// Draws `text` with its baseline starting at `(x, y)`.
    fn draw_text(&mut self, text: &str, x: i32, y: i32);

    fn draw_rect_outline(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgba<u8>);

    fn draw_circle_outline(&mut self, x: i32, y: i32, radius: i32, color: Rgba<u8>);

    /// Called once the cycle's drawing is complete.
    fn present(&mut self) {}
}

/// Overlap of a `len`-long span starting at `start` with `0..limit`, as
/// `(offset into the span, offset into 0..limit, length)`.
fn clip_span(start: i32, len: u32, limit: u32) -> Option<(u32, u32, u32)> {
    let begin = i64::from(start).max(0);
    let end = (i64::from(start) + i64::from(len)).min(i64::from(limit));
    if begin >= end {
        return None;
    }
    Some((
        (begin - i64::from(start)) as u32,
        begin as u32,
        (end - begin) as u32,
    ))
}

// DejaVu Serif, see assets/DejaVuSerif-LICENSE
const DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSerif.ttf");

/// The bundled serif font used for overlay text unless another one is configured.
pub fn default_font() -> Option<Font<'static>> {
    Font::try_from_bytes(DEFAULT_FONT)
}

/// A [`Surface`] backed by an in-memory RGBA image.
pub struct ImageSurface {
    canvas: RgbaImage,
    style: TextStyle,
    font: Option<Font<'static>>,
    sink: Option<SharedState>,
}

impl ImageSurface {
    /// A transparent canvas that draws text with [`default_font`].
    pub fn new(width: u32, height: u32) -> Self {
        let font = default_font();
        if font.is_none() {
            log::error!("bundled font is unreadable, text will not be drawn");
        }
        Self {
            canvas: RgbaImage::new(width, height),
            style: TextStyle::default(),
            font,
            sink: None,
        }
    }

    /// Publishes the canvas to `shared` on every [`Surface::present`].
    pub fn with_sink(mut self, shared: SharedState) -> Self {
        self.sink = Some(shared);
        self
    }

    /// Replaces the bundled font.
    pub fn with_font(mut self, font: Font<'static>) -> Self {
        self.font = Some(font);
        self
    }

    /// Loads a TrueType/OpenType font for text drawing.
    pub fn load_font(path: &Path) -> Result<Font<'static>> {
        let bytes = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Font::try_from_vec(bytes)
            .ok_or_else(|| Error::Config(format!("{} is not a usable font", path.display())))
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn text_style(&self) -> TextStyle {
        self.style
    }
}

impl Surface for ImageSurface {
    fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn draw_frame(&mut self, frame: &RgbaImage) {
        if frame.dimensions() == self.canvas.dimensions() {
            self.canvas.copy_from_slice(frame.as_raw());
        } else {
            let (w, h) = self.canvas.dimensions();
            self.canvas = imageops::resize(frame, w, h, imageops::FilterType::Triangle);
        }
    }

    fn read_region(&self, region: &BoundingRegion, buffer: &mut PixelBuffer) {
        buffer.reshape(region.width, region.height);
        let (cw, ch) = self.canvas.dimensions();
        let (Some((bx, sx, w)), Some((by, sy, h))) = (
            clip_span(region.min_x, region.width, cw),
            clip_span(region.min_y, region.height, ch),
        ) else {
            return;
        };

        let src = self.canvas.as_raw();
        let dst_stride = region.width as usize * 4;
        let dst = buffer.as_raw_mut();
        for row in 0..h as usize {
            let s = ((sy as usize + row) * cw as usize + sx as usize) * 4;
            let d = (by as usize + row) * dst_stride + bx as usize * 4;
            let n = w as usize * 4;
            dst[d..d + n].copy_from_slice(&src[s..s + n]);
        }
    }

    fn write_region(&mut self, buffer: &PixelBuffer, x: i32, y: i32) {
        let (cw, ch) = self.canvas.dimensions();
        let (Some((bx, dx, w)), Some((by, dy, h))) = (
            clip_span(x, buffer.width(), cw),
            clip_span(y, buffer.height(), ch),
        ) else {
            return;
        };

        let src = buffer.as_raw();
        let src_stride = buffer.width() as usize * 4;
        let dst: &mut [u8] = &mut self.canvas;
        for row in 0..h as usize {
            let s = (by as usize + row) * src_stride + bx as usize * 4;
            let d = ((dy as usize + row) * cw as usize + dx as usize) * 4;
            let n = w as usize * 4;
            dst[d..d + n].copy_from_slice(&src[s..s + n]);
        }
    }

    fn set_text_style(&mut self, style: TextStyle) {
        self.style = style;
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32) {
        let Some(font) = &self.font else {
            return;
        };
        // imageproc places the glyph box's top edge at `y`.
        let top = y - self.style.size.round() as i32;
        draw_text_mut(
            &mut self.canvas,
            self.style.color,
            x,
            top,
            Scale::uniform(self.style.size),
            font,
            text,
        );
    }

    fn draw_rect_outline(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgba<u8>) {
        if width == 0 || height == 0 {
            return;
        }
        draw_hollow_rect_mut(&mut self.canvas, Rect::at(x, y).of_size(width, height), color);
    }

    fn draw_circle_outline(&mut self, x: i32, y: i32, radius: i32, color: Rgba<u8>) {
        draw_hollow_circle_mut(&mut self.canvas, (x, y), radius, color);
    }

    fn present(&mut self) {
        if let Some(shared) = &self.sink {
            state::lock(shared).image = Some(self.canvas.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 7, 255]))
    }

    #[test]
    fn read_inside_copies_pixels() {
        let mut surface = ImageSurface::new(32, 16);
        surface.draw_frame(&gradient(32, 16));

        let mut buffer = PixelBuffer::default();
        let region = BoundingRegion { min_x: 4, min_y: 2, width: 3, height: 2 };
        surface.read_region(&region, &mut buffer);

        assert_eq!((buffer.width(), buffer.height()), (3, 2));
        assert_eq!(buffer.pixel(0, 0), Rgba([4, 2, 7, 255]));
        assert_eq!(buffer.pixel(2, 1), Rgba([6, 3, 7, 255]));
    }

    #[test]
    fn read_outside_is_transparent_black() {
        let mut surface = ImageSurface::new(8, 8);
        surface.draw_frame(&gradient(8, 8));

        let mut buffer = PixelBuffer::default();
        let region = BoundingRegion { min_x: -2, min_y: 6, width: 4, height: 4 };
        surface.read_region(&region, &mut buffer);

        assert_eq!(buffer.pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(buffer.pixel(2, 0), Rgba([0, 6, 7, 255]));
        assert_eq!(buffer.pixel(3, 1), Rgba([1, 7, 7, 255]));
        assert_eq!(buffer.pixel(3, 2), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn write_is_clipped_at_the_edges() {
        let mut surface = ImageSurface::new(4, 4);
        let red = Rgba([255, 0, 0, 255]);
        let buffer = PixelBuffer::filled(3, 3, red);
        surface.write_region(&buffer, 2, -1);

        let canvas = surface.canvas();
        assert_eq!(*canvas.get_pixel(2, 0), red);
        assert_eq!(*canvas.get_pixel(3, 1), red);
        assert_eq!(*canvas.get_pixel(1, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*canvas.get_pixel(2, 2), Rgba([0, 0, 0, 0]));

        // entirely off-surface writes do nothing
        surface.write_region(&buffer, 10, 10);
    }

    #[test]
    fn frames_are_stretched_to_the_surface() {
        let mut surface = ImageSurface::new(20, 10);
        surface.draw_frame(&RgbaImage::from_pixel(40, 20, Rgba([9, 9, 9, 255])));
        assert_eq!(surface.canvas().dimensions(), (20, 10));
        assert_eq!(*surface.canvas().get_pixel(10, 5), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn text_is_drawn_with_the_bundled_font() {
        let mut surface = ImageSurface::new(120, 40);
        surface.draw_text("60 fps", 15, 20);

        let touched = (15..80)
            .flat_map(|x| (0..25).map(move |y| (x, y)))
            .any(|(x, y)| *surface.canvas().get_pixel(x, y) != Rgba([0, 0, 0, 0]));
        assert!(touched);
        // nothing below the line
        assert!(surface.canvas().enumerate_pixels().all(|(_, y, p)| y < 30 || p.0 == [0; 4]));
    }

    #[test]
    fn read_write_round_trip_leaves_canvas_unchanged() {
        let mut surface = ImageSurface::new(16, 16);
        surface.draw_frame(&gradient(16, 16));
        let before = surface.canvas().clone();

        let mut buffer = PixelBuffer::default();
        let region = BoundingRegion { min_x: 3, min_y: 5, width: 6, height: 4 };
        surface.read_region(&region, &mut buffer);
        surface.write_region(&buffer, region.min_x, region.min_y);

        assert_eq!(surface.canvas(), &before);
    }
}
