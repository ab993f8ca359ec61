use crate::face::Point3;

/// Integer-aligned rectangle on the surface, derived from a landmark group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingRegion {
    pub min_x: i32,
    pub min_y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingRegion {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Computes the bounding region of `points` on a surface of `surface_size`.
///
/// The running minimum is seeded with the surface extent and the running maximum with zero,
/// so a single point still yields a valid (zero-sized) region. All four extremes are floored,
/// which keeps both corners on the pixel grid used for cropping, and then clamped to the
/// surface, so a stray landmark can never produce a region larger than the surface.
///
/// `points` must not be empty; the scheduler skips empty groups before calling this.
pub fn bounding_region(points: &[Point3], surface_size: (u32, u32)) -> BoundingRegion {
    debug_assert!(!points.is_empty(), "bounding_region called with empty group");

    let mut min_x = surface_size.0 as f32;
    let mut min_y = surface_size.1 as f32;
    let mut max_x = 0.0f32;
    let mut max_y = 0.0f32;

    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let (w, h) = (clamp_extent(surface_size.0), clamp_extent(surface_size.1));
    let min_x = (min_x.floor() as i32).clamp(0, w);
    let min_y = (min_y.floor() as i32).clamp(0, h);
    let max_x = (max_x.floor() as i32).clamp(0, w);
    let max_y = (max_y.floor() as i32).clamp(0, h);

    BoundingRegion {
        min_x,
        min_y,
        width: max_x.saturating_sub(min_x).max(0) as u32,
        height: max_y.saturating_sub(min_y).max(0) as u32,
    }
}

fn clamp_extent(extent: u32) -> i32 {
    i32::try_from(extent).unwrap_or(i32::MAX)
}
