use image::Rgba;

/// Added to the red channel of every pixel inside the eye mask.
pub const RED_DELTA: u8 = 40;
/// Added to the blue channel of every pixel inside the eye mask.
pub const BLUE_DELTA: u8 = 30;

/// A rectangular block of RGBA8 pixels, addressed relative to its own top-left corner.
///
/// The backing storage survives [`PixelBuffer::reshape`], so one buffer can be reused for
/// every crop of the same eye slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut buffer = Self::default();
        buffer.reshape(width, height);
        buffer
    }

    pub fn filled(width: u32, height: u32, pixel: Rgba<u8>) -> Self {
        let mut buffer = Self::new(width, height);
        for chunk in buffer.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&pixel.0);
        }
        buffer
    }

    /// Resizes to `width` x `height`, zeroing every pixel. Keeps the allocation.
    pub fn reshape(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(width as usize * height as usize * 4, 0);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        (y as usize * self.width as usize + x as usize) * 4
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        let i = self.offset(x, y);
        Rgba([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&pixel.0);
    }
}

/// Whether `(x, y)` lies strictly inside the mask inscribed in a `width` x `height` crop.
///
/// The radius is half the *width*; a crop taller than it is wide gets its top and bottom rows
/// cut off, a wider one gets a circle that spills past the top and bottom edges.
pub fn in_eye_mask(x: u32, y: u32, width: u32, height: u32) -> bool {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let r = width as f32 / 2.0;
    let dx = x as f32 - cx;
    let dy = y as f32 - cy;
    dx * dx + dy * dy < r * r
}

/// Tints the eye crop in place: red and blue are raised inside the inscribed mask, clamped at
/// 255. Green, alpha and everything outside the mask are left alone.
pub fn recolor_eye(buffer: &mut PixelBuffer) {
    let (width, height) = (buffer.width, buffer.height);
    if width == 0 || height == 0 {
        return;
    }

    for (i, px) in buffer.data.chunks_exact_mut(4).enumerate() {
        let x = (i % width as usize) as u32;
        let y = (i / width as usize) as u32;
        if !in_eye_mask(x, y, width, height) {
            continue;
        }
        px[0] = px[0].saturating_add(RED_DELTA);
        px[2] = px[2].saturating_add(BLUE_DELTA);
    }
}
